//! Drive mode type and label parsing

use core::fmt;
use core::str::FromStr;

/// Operator-selected control regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DriveMode {
    /// Operator drives steering and throttle
    #[default]
    User,
    /// Pilot steers, operator controls speed
    LocalAngle,
    /// Pilot drives steering and throttle
    LocalPilot,
}

impl DriveMode {
    /// All modes in controller cycle order
    pub const ALL: [DriveMode; 3] = [DriveMode::User, DriveMode::LocalAngle, DriveMode::LocalPilot];

    /// Label published on the `user/mode` channel and stored in recordings
    pub const fn label(self) -> &'static str {
        match self {
            DriveMode::User => "user",
            DriveMode::LocalAngle => "local_angle",
            DriveMode::LocalPilot => "local",
        }
    }

    /// Interpret a label published by a controller.
    ///
    /// Controllers only distinguish `user` and `local_angle`; every other
    /// label means full autonomy.
    pub fn from_label(label: &str) -> Self {
        match label {
            "user" => DriveMode::User,
            "local_angle" => DriveMode::LocalAngle,
            _ => DriveMode::LocalPilot,
        }
    }

    /// Next mode in cycle order (used by single-button mode toggles)
    pub const fn next(self) -> Self {
        match self {
            DriveMode::User => DriveMode::LocalAngle,
            DriveMode::LocalAngle => DriveMode::LocalPilot,
            DriveMode::LocalPilot => DriveMode::User,
        }
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error for an operator-typed mode label that names no mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseModeError;

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown drive mode (expected user, local_angle or local)")
    }
}

impl FromStr for DriveMode {
    type Err = ParseModeError;

    /// Strict parse: unknown labels are rejected instead of falling back
    /// to full autonomy.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(DriveMode::User),
            "local_angle" => Ok(DriveMode::LocalAngle),
            "local" | "local_pilot" => Ok(DriveMode::LocalPilot),
            _ => Err(ParseModeError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_user() {
        assert_eq!(DriveMode::default(), DriveMode::User);
    }

    #[test]
    fn test_label_round_trip() {
        for mode in DriveMode::ALL {
            assert_eq!(DriveMode::from_label(mode.label()), mode);
            assert_eq!(mode.label().parse::<DriveMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_from_label_unknown_is_autonomous() {
        assert_eq!(DriveMode::from_label("local"), DriveMode::LocalPilot);
        assert_eq!(DriveMode::from_label("pilot"), DriveMode::LocalPilot);
        assert_eq!(DriveMode::from_label(""), DriveMode::LocalPilot);
        assert_eq!(DriveMode::from_label("USER"), DriveMode::LocalPilot);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert_eq!("pilot".parse::<DriveMode>(), Err(ParseModeError));
        assert_eq!("".parse::<DriveMode>(), Err(ParseModeError));
        assert_eq!(" user ".parse::<DriveMode>(), Ok(DriveMode::User));
        assert_eq!("local_pilot".parse::<DriveMode>(), Ok(DriveMode::LocalPilot));
    }

    #[test]
    fn test_next_cycles_through_all_modes() {
        let mut mode = DriveMode::User;
        for expected in [DriveMode::LocalAngle, DriveMode::LocalPilot, DriveMode::User] {
            mode = mode.next();
            assert_eq!(mode, expected);
        }
    }

    #[test]
    fn test_display_uses_label() {
        assert_eq!(format!("{}", DriveMode::LocalAngle), "local_angle");
    }
}

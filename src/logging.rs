//! Logging setup
//!
//! All crates log through `tracing`. Binaries call [`init`] once; the filter
//! comes from `RUST_LOG` when set, otherwise from the given default
//! directive (for example `donkey_car=info`).

use tracing_subscriber::EnvFilter;

/// Default filter used by the binaries
pub const DEFAULT_DIRECTIVE: &str = "donkey_car=info,drive=info,train=info";

/// Install the global fmt subscriber.
///
/// Returns `false` if a subscriber was already installed (tests, repeated
/// calls); the existing one stays active.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init(DEFAULT_DIRECTIVE);
        assert!(!init(DEFAULT_DIRECTIVE));
    }
}

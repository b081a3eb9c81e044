//! Vehicle memory: the named channels parts read from and write to
//!
//! Every part declares input and output channel names (`cam/image_array`,
//! `user/angle`, ...). The drive loop reads inputs from memory before a
//! part runs and stores its outputs afterwards. Unset channels read as
//! [`Value::Null`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Camera frame, row-major, `channels` bytes per pixel.
#[derive(Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// 1 = grayscale, 3 = RGB
    pub channels: u8,
    pub data: Arc<[u8]>,
}

impl Image {
    /// Build an image, checking the buffer length against the dimensions.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Option<Self> {
        if !matches!(channels, 1 | 3) {
            return None;
        }
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(channels as usize)?;
        if data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data: data.into(),
        })
    }

    /// Mean intensity of a pixel (all channels averaged).
    pub fn intensity(&self, x: u32, y: u32) -> u8 {
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        let sum: u32 = self.data[start..start + c].iter().map(|&b| b as u32).sum();
        (sum / c as u32) as u8
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

/// A value stored on a memory channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Str(String),
    Image(Image),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Value::Image(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Image> for Value {
    fn from(v: Image) -> Self {
        Value::Image(v)
    }
}

/// Shared channel store for one vehicle.
#[derive(Debug, Default)]
pub struct Memory {
    channels: HashMap<String, Value>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a single channel (`Null` when unset).
    pub fn get_one(&self, key: &str) -> Value {
        self.channels.get(key).cloned().unwrap_or_default()
    }

    /// Read several channels in order.
    pub fn get<S: AsRef<str>>(&self, keys: &[S]) -> Vec<Value> {
        keys.iter().map(|k| self.get_one(k.as_ref())).collect()
    }

    pub fn put_one(&mut self, key: &str, value: Value) {
        self.channels.insert(key.to_string(), value);
    }

    /// Store values on channels pairwise.
    ///
    /// Returns the pair counts on mismatch; nothing is written then.
    pub fn put<S: AsRef<str>>(&mut self, keys: &[S], values: Vec<Value>) -> Result<(), (usize, usize)> {
        if keys.len() != values.len() {
            return Err((keys.len(), values.len()));
        }
        for (key, value) in keys.iter().zip(values) {
            self.put_one(key.as_ref(), value);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_rejects_dimensions_that_overflow() {
        assert!(Image::new(u32::MAX, u32::MAX, 3, vec![0]).is_none());
        assert!(Image::new(u32::MAX, 2, 1, vec![0]).is_none());
    }

    #[test]
    fn unset_channels_read_as_null() {
        let mem = Memory::new();
        assert_eq!(mem.get(&["user/angle", "pilot/angle"]), vec![Value::Null, Value::Null]);
    }

    #[test]
    fn put_then_get_in_order() {
        let mut mem = Memory::new();
        mem.put(&["angle", "throttle"], vec![Value::Float(0.5), Value::Float(-0.2)])
            .unwrap();
        assert_eq!(mem.get(&["throttle", "angle"]), vec![Value::Float(-0.2), Value::Float(0.5)]);
        assert_eq!(mem.len(), 2);
    }

    #[test]
    fn put_rejects_count_mismatch() {
        let mut mem = Memory::new();
        let err = mem
            .put(&["angle", "throttle"], vec![Value::Float(0.5)])
            .unwrap_err();
        assert_eq!(err, (2, 1));
        assert!(mem.is_empty());
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::Float(0.25).as_f32(), Some(0.25));
        assert_eq!(Value::Int(2).as_f32(), Some(2.0));
        assert_eq!(Value::Str("user".into()).as_f32(), None);
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::from("local").as_str(), Some("local"));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn image_checks_buffer_length() {
        assert!(Image::new(2, 2, 3, vec![0; 12]).is_some());
        assert!(Image::new(2, 2, 3, vec![0; 11]).is_none());
        assert!(Image::new(2, 2, 2, vec![0; 8]).is_none());
    }

    #[test]
    fn image_intensity_averages_channels() {
        let img = Image::new(2, 1, 3, vec![0, 0, 0, 30, 60, 90]).unwrap();
        assert_eq!(img.intensity(0, 0), 0);
        assert_eq!(img.intensity(1, 0), 60);
    }
}

//! Wall-clock timestamp part

use async_trait::async_trait;
use chrono::{Local, SecondsFormat};

use crate::error::PartError;
use crate::memory::Value;
use crate::vehicle::Part;

/// Publishes the current local time (RFC 3339, millisecond precision) on
/// the `timestamp` channel.
#[derive(Debug, Default)]
pub struct Timestamp;

impl Timestamp {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Part for Timestamp {
    fn name(&self) -> &str {
        "timestamp"
    }

    async fn run(&mut self, _inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Millis, false);
        Ok(vec![Value::Str(now)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_parseable_timestamp() {
        let mut clock = Timestamp::new();
        let out = clock.run(&[]).await.unwrap();
        assert_eq!(out.len(), 1);
        let text = out[0].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok());
    }
}

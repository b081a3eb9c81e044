use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{image_file_name, record_file_name, write_frame, ChannelType, Tub, TubMeta, META_FILE, MILLISECONDS_KEY};
use crate::error::{PartError, TubError};
use crate::memory::Value;
use crate::vehicle::Part;

/// Appends one record per tick to a tub directory.
///
/// Wired with `run_condition("recording")` so that records are only
/// written while the operator has recording switched on.
#[derive(Debug)]
pub struct TubWriter {
    path: PathBuf,
    meta: TubMeta,
    next_index: usize,
    started: Instant,
}

impl TubWriter {
    /// Open `path` for writing, creating it if needed.
    ///
    /// An existing tub must have been recorded with the same channels;
    /// numbering continues after its last record.
    pub fn new<S: AsRef<str>, T: AsRef<str>>(
        path: impl AsRef<Path>,
        inputs: &[S],
        types: &[T],
    ) -> Result<Self, TubError> {
        let path = path.as_ref().to_path_buf();
        let meta = TubMeta::new(inputs, types)?;
        fs::create_dir_all(&path)?;

        let next_index = if path.join(META_FILE).is_file() {
            let existing = Tub::open(&path)?;
            if existing.meta() != &meta {
                return Err(TubError::IncompatibleMeta(path));
            }
            existing.record_indexes()?.last().map_or(0, |last| last + 1)
        } else {
            let text = serde_json::to_string(&meta).map_err(|source| TubError::Json {
                path: path.join(META_FILE),
                source,
            })?;
            fs::write(path.join(META_FILE), text)?;
            0
        };

        info!(path = %path.display(), channels = meta.inputs.len(), next_index, "Tub opened for writing");
        Ok(Self {
            path,
            meta,
            next_index,
            started: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index the next record will be written under.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    fn encode(&self, index: usize, key: &str, kind: ChannelType, value: &Value) -> Result<Json, TubError> {
        let mismatch = || TubError::TypeMismatch {
            key: key.to_string(),
            expected: kind.to_string(),
        };
        Ok(match (kind, value) {
            (_, Value::Null) => Json::Null,
            (ChannelType::Float, v) => Json::from(f64::from(v.as_f32().ok_or_else(mismatch)?)),
            (ChannelType::Int, Value::Int(v)) => Json::from(*v),
            (ChannelType::Str, Value::Str(v)) => Json::from(v.as_str()),
            (ChannelType::Boolean, Value::Bool(v)) => Json::from(*v),
            (ChannelType::ImageArray, Value::Image(image)) => {
                let name = image_file_name(index, key);
                write_frame(self.path.join(&name), image)?;
                Json::from(name)
            }
            _ => return Err(mismatch()),
        })
    }

    fn write_record(&mut self, inputs: &[Value]) -> Result<(), TubError> {
        if inputs.len() != self.meta.inputs.len() {
            return Err(TubError::RecordLength {
                expected: self.meta.inputs.len(),
                actual: inputs.len(),
            });
        }
        let index = self.next_index;
        let mut record = Map::new();
        for ((key, kind), value) in self.meta.inputs.iter().zip(&self.meta.types).zip(inputs) {
            record.insert(key.clone(), self.encode(index, key, *kind, value)?);
        }
        let millis = self.started.elapsed().as_millis() as u64;
        record.insert(MILLISECONDS_KEY.to_string(), Json::from(millis));

        let path = self.path.join(record_file_name(index));
        let text = serde_json::to_string(&record).map_err(|source| TubError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text)?;
        debug!(index, "Record written");
        self.next_index += 1;
        Ok(())
    }
}

#[async_trait]
impl Part for TubWriter {
    fn name(&self) -> &str {
        "tub_writer"
    }

    async fn run(&mut self, inputs: &[Value]) -> Result<Vec<Value>, PartError> {
        self.write_record(inputs)?;
        Ok(Vec::new())
    }

    async fn shutdown(&mut self) -> Result<(), PartError> {
        info!(path = %self.path.display(), records = self.next_index, "Tub closed");
        Ok(())
    }
}

//! Tub: the on-disk recording of driving data
//!
//! A tub is a directory:
//!
//! ```text
//! tub/
//!   meta.json                    {"inputs": [...], "types": [...]}
//!   record_0.json                {"user/angle": 0.1, ..., "milliseconds": 50}
//!   0_cam-image_array_.png       camera frame (RGB or grayscale)
//!   record_1.json
//!   ...
//! ```
//!
//! Image channels are stored in side files and referenced by file name
//! from the record. [`TubWriter`] appends records during a drive;
//! [`Tub`] and [`TubGroup`] read them back for training.

mod image;
mod writer;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use image::{read_frame, write_frame};
pub use writer::TubWriter;

use crate::error::TubError;
use crate::memory::{Image, Value};

pub const META_FILE: &str = "meta.json";

/// Key holding milliseconds since the writer started.
pub const MILLISECONDS_KEY: &str = "milliseconds";

/// Channel read as model input during training.
pub const IMAGE_KEY: &str = "cam/image_array";

/// Channels used as training targets.
pub const ANGLE_KEY: &str = "user/angle";
pub const THROTTLE_KEY: &str = "user/throttle";

/// Declared type of a recorded channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "image_array")]
    ImageArray,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "str")]
    Str,
    #[serde(rename = "boolean")]
    Boolean,
}

impl ChannelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::ImageArray => "image_array",
            ChannelType::Float => "float",
            ChannelType::Int => "int",
            ChannelType::Str => "str",
            ChannelType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = TubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_array" => Ok(ChannelType::ImageArray),
            "float" => Ok(ChannelType::Float),
            "int" => Ok(ChannelType::Int),
            "str" => Ok(ChannelType::Str),
            "boolean" => Ok(ChannelType::Boolean),
            other => Err(TubError::UnknownType(other.to_string())),
        }
    }
}

/// Contents of `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TubMeta {
    pub inputs: Vec<String>,
    pub types: Vec<ChannelType>,
}

impl TubMeta {
    /// Pair channel names with type labels.
    pub fn new<S: AsRef<str>, T: AsRef<str>>(inputs: &[S], types: &[T]) -> Result<Self, TubError> {
        if inputs.len() != types.len() {
            return Err(TubError::MetaMismatch {
                inputs: inputs.len(),
                types: types.len(),
            });
        }
        let types = types
            .iter()
            .map(|t| t.as_ref().parse())
            .collect::<Result<Vec<ChannelType>, _>>()?;
        Ok(Self {
            inputs: inputs.iter().map(|s| s.as_ref().to_string()).collect(),
            types,
        })
    }

    pub fn channel_type(&self, key: &str) -> Option<ChannelType> {
        self.inputs
            .iter()
            .position(|k| k == key)
            .map(|i| self.types[i])
    }
}

/// File name of the record with the given index.
pub fn record_file_name(index: usize) -> String {
    format!("record_{}.json", index)
}

/// File name of an image side file.
pub fn image_file_name(index: usize, key: &str) -> String {
    format!("{}_{}_.png", index, key.replace('/', "-"))
}

/// Side files must sit directly in the tub directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn parse_record_index(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("record_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> TubError + '_ {
    move |source| TubError::Json {
        path: path.to_path_buf(),
        source,
    }
}

/// A recorded tub opened for reading.
#[derive(Debug, Clone)]
pub struct Tub {
    path: PathBuf,
    meta: TubMeta,
}

/// One decoded record: channel name → value.
pub type Record = HashMap<String, Value>;

impl Tub {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TubError> {
        let path = path.as_ref();
        let meta_path = path.join(META_FILE);
        if !meta_path.is_file() {
            return Err(TubError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(&meta_path)?;
        let meta: TubMeta = serde_json::from_str(&text).map_err(json_error(&meta_path))?;
        if meta.inputs.len() != meta.types.len() {
            return Err(TubError::MetaMismatch {
                inputs: meta.inputs.len(),
                types: meta.types.len(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            meta,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &TubMeta {
        &self.meta
    }

    /// Indexes of all records, ascending.
    pub fn record_indexes(&self) -> Result<Vec<usize>, TubError> {
        let mut indexes = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if let Some(index) = entry.file_name().to_str().and_then(parse_record_index) {
                indexes.push(index);
            }
        }
        indexes.sort_unstable();
        Ok(indexes)
    }

    pub fn len(&self) -> Result<usize, TubError> {
        Ok(self.record_indexes()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TubError> {
        Ok(self.len()? == 0)
    }

    /// Read and decode one record. Image side files are loaded.
    pub fn read_record(&self, index: usize) -> Result<Record, TubError> {
        let path = self.path.join(record_file_name(index));
        let text = fs::read_to_string(&path)?;
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&text).map_err(json_error(&path))?;

        let mut record = Record::new();
        for (key, json) in raw {
            let value = match self.meta.channel_type(&key) {
                Some(kind) => self.decode(&key, kind, json)?,
                None if key == MILLISECONDS_KEY => json.as_i64().map(Value::Int).unwrap_or_default(),
                None => continue,
            };
            record.insert(key, value);
        }
        Ok(record)
    }

    /// Every record, in index order.
    pub fn records(&self) -> Result<Vec<Record>, TubError> {
        self.record_indexes()?
            .into_iter()
            .map(|i| self.read_record(i))
            .collect()
    }

    fn decode(&self, key: &str, kind: ChannelType, json: serde_json::Value) -> Result<Value, TubError> {
        use serde_json::Value as Json;

        let mismatch = || TubError::TypeMismatch {
            key: key.to_string(),
            expected: kind.to_string(),
        };
        Ok(match (kind, json) {
            (_, Json::Null) => Value::Null,
            (ChannelType::Float, Json::Number(n)) => Value::Float(n.as_f64().ok_or_else(mismatch)? as f32),
            (ChannelType::Int, Json::Number(n)) => Value::Int(n.as_i64().ok_or_else(mismatch)?),
            (ChannelType::Str, Json::String(s)) => Value::Str(s),
            (ChannelType::Boolean, Json::Bool(b)) => Value::Bool(b),
            (ChannelType::ImageArray, Json::String(file)) => {
                if !is_plain_file_name(&file) {
                    return Err(TubError::Image {
                        path: PathBuf::from(&file),
                        reason: "image reference leaves the tub directory".to_string(),
                    });
                }
                Value::Image(read_frame(self.path.join(file))?)
            }
            _ => return Err(mismatch()),
        })
    }
}

/// Input image and target sample extracted from one record.
#[derive(Debug, Clone)]
pub struct TrainingRecord {
    pub image: Image,
    pub angle: f32,
    pub throttle: f32,
}

/// Several tubs read as one data set.
#[derive(Debug, Clone)]
pub struct TubGroup {
    tubs: Vec<Tub>,
}

impl TubGroup {
    /// Open every tub; any missing tub is an error.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, TubError> {
        let tubs = paths
            .iter()
            .map(|p| Tub::open(p))
            .collect::<Result<Vec<_>, _>>()?;
        info!(tubs = tubs.len(), "Opened tub group");
        Ok(Self { tubs })
    }

    pub fn tubs(&self) -> &[Tub] {
        &self.tubs
    }

    /// Total record count over all tubs.
    pub fn len(&self) -> Result<usize, TubError> {
        self.tubs.iter().map(Tub::len).sum()
    }

    pub fn is_empty(&self) -> Result<bool, TubError> {
        Ok(self.len()? == 0)
    }

    /// Decode every record carrying an image and both targets.
    ///
    /// Records where one of them is null (camera warming up) are skipped;
    /// a record missing a key entirely is an error.
    pub fn training_records(&self) -> Result<Vec<TrainingRecord>, TubError> {
        let mut out = Vec::new();
        let mut skipped = 0usize;
        for tub in &self.tubs {
            for index in tub.record_indexes()? {
                let record = tub.read_record(index)?;
                let get = |key: &str| {
                    record.get(key).ok_or_else(|| TubError::MissingKey {
                        index,
                        key: key.to_string(),
                    })
                };
                let (image, angle, throttle) = (get(IMAGE_KEY)?, get(ANGLE_KEY)?, get(THROTTLE_KEY)?);
                match (image.as_image(), angle.as_f32(), throttle.as_f32()) {
                    (Some(image), Some(angle), Some(throttle)) => out.push(TrainingRecord {
                        image: image.clone(),
                        angle,
                        throttle,
                    }),
                    _ => skipped += 1,
                }
            }
        }
        if skipped > 0 {
            debug!(skipped, "Skipped records with null values");
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_tub(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("donkey_tub_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn channel_type_labels() {
        for kind in [
            ChannelType::ImageArray,
            ChannelType::Float,
            ChannelType::Int,
            ChannelType::Str,
            ChannelType::Boolean,
        ] {
            assert_eq!(kind.as_str().parse::<ChannelType>().unwrap(), kind);
        }
        assert!(matches!("vector".parse::<ChannelType>(), Err(TubError::UnknownType(_))));
    }

    #[test]
    fn meta_requires_matching_lengths() {
        assert!(TubMeta::new(&["a", "b"], &["float"]).is_err());
        let meta = TubMeta::new(&["user/angle", "user/mode"], &["float", "str"]).unwrap();
        assert_eq!(meta.channel_type("user/mode"), Some(ChannelType::Str));
        assert_eq!(meta.channel_type("nope"), None);
    }

    #[test]
    fn file_names() {
        assert_eq!(record_file_name(12), "record_12.json");
        assert_eq!(image_file_name(3, "cam/image_array"), "3_cam-image_array_.png");
        assert_eq!(parse_record_index("record_7.json"), Some(7));
        assert_eq!(parse_record_index("meta.json"), None);
        assert_eq!(parse_record_index("record_x.json"), None);
    }

    #[test]
    fn image_reference_must_stay_in_tub() {
        assert!(is_plain_file_name("0_cam-image_array_.png"));
        assert!(!is_plain_file_name("../other/0_cam-image_array_.png"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name("sub/0.png"));
        assert!(!is_plain_file_name(".."));

        let dir = temp_tub("escape");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(META_FILE), r#"{"inputs": ["cam/image_array"], "types": ["image_array"]}"#).unwrap();
        fs::write(dir.join("record_0.json"), r#"{"cam/image_array": "../secret.png"}"#).unwrap();

        let tub = Tub::open(&dir).unwrap();
        assert!(matches!(tub.read_record(0), Err(TubError::Image { .. })));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn open_missing_tub_fails() {
        let dir = temp_tub("missing");
        assert!(matches!(Tub::open(&dir), Err(TubError::NotFound(_))));
    }

    #[test]
    fn read_record_checks_types() {
        let dir = temp_tub("types");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(META_FILE),
            r#"{"inputs": ["user/angle", "user/mode"], "types": ["float", "str"]}"#,
        )
        .unwrap();
        fs::write(dir.join("record_0.json"), r#"{"user/angle": 0.5, "user/mode": "user", "milliseconds": 40}"#).unwrap();
        fs::write(dir.join("record_1.json"), r#"{"user/angle": "left", "user/mode": "user"}"#).unwrap();

        let tub = Tub::open(&dir).unwrap();
        assert_eq!(tub.record_indexes().unwrap(), vec![0, 1]);

        let record = tub.read_record(0).unwrap();
        assert_eq!(record["user/angle"], Value::Float(0.5));
        assert_eq!(record["user/mode"], Value::from("user"));
        assert_eq!(record[MILLISECONDS_KEY], Value::Int(40));

        assert!(matches!(tub.read_record(1), Err(TubError::TypeMismatch { .. })));
        fs::remove_dir_all(&dir).unwrap();
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::entry::Entry;
use crate::error::Result;

/// How the cached remote content was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    Pull,
    Push,
}

/// Last library content seen on (or written to) the remote
///
/// Kept only to tell whether the remote moved on since the last sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub filename: String,

    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,

    pub origin: SnapshotOrigin,

    pub recorded_at: DateTime<Utc>,
}

impl RemoteSnapshot {
    pub fn new(filename: impl Into<String>, content: Vec<u8>, origin: SnapshotOrigin) -> Self {
        RemoteSnapshot {
            filename: filename.into(),
            content,
            origin,
            recorded_at: Utc::now(),
        }
    }

    /// Whether `content` is byte-identical to the cached copy
    pub fn matches(&self, content: &[u8]) -> bool {
        self.content == content
    }

    /// Decode the cached content
    pub fn entries(&self) -> Result<Vec<Entry>> {
        codec::decode_named(&codec::decode_bytes(&self.content), &self.filename)
    }
}

/// JSON has no byte strings, so the content is stored base64-encoded
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

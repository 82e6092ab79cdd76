use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Position of an event in the transaction log.
///
/// Ordered lexicographically by `(commit, prepare)`, which is the global
/// ordering the reader is contracted to preserve.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LogPosition {
    pub commit: i64,
    pub prepare: i64,
}

impl LogPosition {
    /// Sentinel ordered before every real event position.
    pub const BEFORE_ANY: LogPosition = LogPosition {
        commit: 0,
        prepare: -10,
    };

    /// Origin of the log; also the initial index-checkpoint boundary.
    pub const START: LogPosition = LogPosition {
        commit: 0,
        prepare: 0,
    };

    /// Creates a position from raw commit/prepare offsets.
    pub const fn new(commit: i64, prepare: i64) -> Self {
        Self { commit, prepare }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C:{}/P:{}", self.commit, self.prepare)
    }
}

/// Commit/prepare pair as spelled inside a checkpoint tag (`"$p"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPosition {
    pub commit: i64,
    pub prepare: i64,
}

/// Projection checkpoint tag.
///
/// Index links carry one in their metadata; `"$et"` checkpoint entries carry
/// one in their data payload. Only the `"$p"` position is required; the
/// version marker and per-stream sequence map are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointTag {
    #[serde(rename = "$v", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "$s", default, skip_serializing_if = "Option::is_none")]
    pub streams: Option<BTreeMap<String, i64>>,
    #[serde(rename = "$p")]
    pub position: TagPosition,
}

impl CheckpointTag {
    /// Creates a tag carrying only a log position.
    pub fn at(position: LogPosition) -> Self {
        Self {
            version: None,
            streams: None,
            position: TagPosition {
                commit: position.commit,
                prepare: position.prepare,
            },
        }
    }

    /// Decodes a tag from a raw JSON payload.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encodes the tag back to its JSON payload form.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// The transaction-log position certified by this tag.
    pub fn log_position(&self) -> LogPosition {
        LogPosition::new(self.position.commit, self.position.prepare)
    }
}

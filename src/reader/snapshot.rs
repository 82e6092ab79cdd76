use super::coordinator::ReaderPhase;
use super::options::{Principal, ReaderOptions};
use crate::model::position::LogPosition;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

/// Resumable capture of a reader's positions and counters.
///
/// Captured via [`TypedEventReader::snapshot`] and persisted by the host.
/// Resumption always restarts in the index phase; the captured stream and
/// log positions keep the resumed delivery stream monotone.
///
/// [`TypedEventReader::snapshot`]: super::coordinator::TypedEventReader::snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderSnapshot {
    pub event_types: Vec<String>,
    pub phase: ReaderPhase,
    pub from_position: LogPosition,
    pub last_delivered: LogPosition,
    pub delivered_count: u64,
    pub stream_positions: BTreeMap<String, i32>,
    pub checkpoint_seq: i32,
    pub checkpoint_position: LogPosition,
    pub resolve_links: bool,
    pub stop_on_eof: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_deliveries: Option<u64>,
}

impl ReaderSnapshot {
    /// Serializes the snapshot to JSON for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restores a snapshot from JSON.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Options resuming a fresh reader at the captured positions.
    ///
    /// The delivery budget, when present, carries only the remainder; a
    /// snapshot whose budget is exhausted fails option validation and
    /// cannot be resumed. The read principal is not persisted and reverts
    /// to the system account unless overridden.
    pub fn into_options(self) -> ReaderOptions {
        let remaining = self
            .max_deliveries
            .map(|max| max.saturating_sub(self.delivered_count));
        ReaderOptions {
            event_types: self.event_types,
            from_position: self.from_position,
            from_stream_positions: self.stream_positions,
            resolve_links: self.resolve_links,
            stop_on_eof: self.stop_on_eof,
            max_deliveries: remaining,
            principal: Principal::system(),
        }
    }

    /// Pairs the serialized snapshot with an integrity checksum.
    pub fn seal(&self) -> Result<SealedSnapshot, serde_json::Error> {
        let payload = self.to_json()?;
        let checksum = checksum(&payload);
        Ok(SealedSnapshot { payload, checksum })
    }
}

/// Snapshot payload paired with a SHA-256 checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSnapshot {
    pub payload: String,
    pub checksum: String,
}

impl SealedSnapshot {
    /// Verifies the checksum and decodes the payload.
    pub fn open(&self) -> Result<ReaderSnapshot, SnapshotError> {
        let observed = checksum(&self.payload);
        if observed != self.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: self.checksum.clone(),
                observed,
            });
        }
        Ok(ReaderSnapshot::from_json(&self.payload)?)
    }
}

/// Failures opening a sealed snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot checksum mismatch (expected {expected}, observed {observed})")]
    ChecksumMismatch { expected: String, observed: String },
    #[error("failed to decode snapshot payload: {0}")]
    Decode(#[from] serde_json::Error),
}

fn checksum(payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    let mut encoded = String::with_capacity(digest.len() * 2);
    for byte in digest {
        encoded.push_str(&format!("{byte:02x}"));
    }
    encoded
}

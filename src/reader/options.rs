use crate::model::position::LogPosition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Prefix of the per-type index streams.
pub const INDEX_STREAM_PREFIX: &str = "$et-";

/// Meta-stream certifying how far the type indexes are populated.
pub const CHECKPOINT_STREAM: &str = "$et";

/// Returns the index stream enumerating events of `event_type`.
pub fn index_stream(event_type: &str) -> String {
    format!("{INDEX_STREAM_PREFIX}{event_type}")
}

/// Opaque principal the environment uses to authorize reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    /// Creates a named principal.
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The built-in system account.
    pub fn system() -> Self {
        Self::named("system")
    }

    /// Name carried by the principal.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::system()
    }
}

/// Construction-time options for a [`TypedEventReader`].
///
/// [`TypedEventReader`]: crate::reader::coordinator::TypedEventReader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderOptions {
    pub event_types: Vec<String>,
    pub from_position: LogPosition,
    pub from_stream_positions: BTreeMap<String, i32>,
    pub resolve_links: bool,
    pub stop_on_eof: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_deliveries: Option<u64>,
    #[serde(default)]
    pub principal: Principal,
}

impl ReaderOptions {
    /// Options reading the given types from the start of the log.
    pub fn for_types<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let event_types: Vec<String> = event_types.into_iter().map(Into::into).collect();
        let from_stream_positions = event_types
            .iter()
            .map(|event_type| (index_stream(event_type), 0))
            .collect();
        Self {
            event_types,
            from_position: LogPosition::BEFORE_ANY,
            from_stream_positions,
            resolve_links: true,
            stop_on_eof: false,
            max_deliveries: None,
            principal: Principal::system(),
        }
    }

    /// Sets the log-phase resume point.
    pub fn with_from_position(mut self, position: LogPosition) -> Self {
        self.from_position = position;
        self
    }

    /// Overrides the resume sequence number of one index stream.
    pub fn with_stream_position(mut self, stream: impl Into<String>, next: i32) -> Self {
        self.from_stream_positions.insert(stream.into(), next);
        self
    }

    /// Controls link resolution on index-stream reads.
    pub fn with_resolve_links(mut self, resolve_links: bool) -> Self {
        self.resolve_links = resolve_links;
        self
    }

    /// Disposes the reader on the first transaction-log EOF.
    pub fn with_stop_on_eof(mut self, stop_on_eof: bool) -> Self {
        self.stop_on_eof = stop_on_eof;
        self
    }

    /// Disposes the reader after `max_deliveries` events.
    pub fn with_max_deliveries(mut self, max_deliveries: u64) -> Self {
        self.max_deliveries = Some(max_deliveries);
        self
    }

    /// Sets the read-authorization principal.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    /// Validates the option set.
    ///
    /// Every configured type must be unique and have exactly one resume
    /// position keyed by its index stream; a delivery budget, when set,
    /// must be at least one.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.event_types.is_empty() {
            return Err(OptionsError::NoEventTypes);
        }
        let mut seen = BTreeSet::new();
        for event_type in &self.event_types {
            if !seen.insert(event_type.as_str()) {
                return Err(OptionsError::DuplicateEventType(event_type.clone()));
            }
        }
        for event_type in &self.event_types {
            let key = index_stream(event_type);
            if !self.from_stream_positions.contains_key(&key) {
                return Err(OptionsError::MissingStreamPosition(key));
            }
        }
        for key in self.from_stream_positions.keys() {
            let known = key
                .strip_prefix(INDEX_STREAM_PREFIX)
                .is_some_and(|event_type| seen.contains(event_type));
            if !known {
                return Err(OptionsError::UnknownStreamPosition(key.clone()));
            }
        }
        if self.max_deliveries == Some(0) {
            return Err(OptionsError::ZeroMaxDeliveries);
        }
        Ok(())
    }
}

/// Rejections raised synchronously at reader construction.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("at least one event type is required")]
    NoEventTypes,
    #[error("event type {0} is configured twice")]
    DuplicateEventType(String),
    #[error("missing resume position for index stream {0}")]
    MissingStreamPosition(String),
    #[error("resume position references unconfigured stream {0}")]
    UnknownStreamPosition(String),
    #[error("max_deliveries must be at least 1 when set")]
    ZeroMaxDeliveries,
}

//! Reader-local observability: a deterministic JSON-line log the host drains.

pub mod logging;

pub use logging::{LogLevel, LogRetention, LogSegment, LoggingError, ReaderLog};

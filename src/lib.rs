//! Multi-type event reader for log-structured event stores.
//!
//! The reader publishes, in strictly increasing log-position order, every
//! event whose type belongs to a caller-configured set. It runs in two
//! phases: first it merges the per-type index streams (`"$et-<type>"`)
//! inside the prefix of the log certified complete by the `"$et"`
//! checkpoint stream, then it switches once to tailing the raw transaction
//! log from the handoff position. The crate is a pure state machine: all
//! I/O, timers, and subscription wiring belong to the host, reached through
//! the [`ReaderSink`] output port.

pub mod model;
pub mod observability;
pub mod reader;

pub use model::{CheckpointTag, EventRecord, LogPosition, PendingEvent, ResolvedEvent, TagPosition};
pub use observability::{LogLevel, LogRetention, LogSegment, LoggingError, ReaderLog};
pub use reader::{
    index_stream, Completion, LogReadCompleted, LogReadResult, OptionsError, OutboundMessage,
    Principal, ReadRequest, ReaderError, ReaderOptions, ReaderPhase, ReaderSink, ReaderSnapshot,
    ReaderTelemetry, SealedSnapshot, SnapshotError, StreamReadCompleted, StreamReadResult,
    SubscriptionNotice, SystemWallClock, TypedEventReader, WallClock, CHECKPOINT_READ_COUNT,
    CHECKPOINT_STREAM, INDEX_STREAM_PREFIX, LOG_READ_COUNT, RETRY_DELAY_MS, STREAM_READ_COUNT,
};

//! The two-phase multi-type reader: options, wire messages, the coordinator
//! state machine, and resumable snapshots.

pub mod coordinator;
pub mod messages;
pub mod options;
pub mod snapshot;

pub use coordinator::{
    ReaderError, ReaderPhase, ReaderTelemetry, SystemWallClock, TypedEventReader, WallClock,
    CHECKPOINT_READ_COUNT, LOG_READ_COUNT, RETRY_DELAY_MS, STREAM_READ_COUNT,
};
pub use messages::{
    Completion, LogReadCompleted, LogReadResult, OutboundMessage, ReadRequest, ReaderSink,
    StreamReadCompleted, StreamReadResult, SubscriptionNotice,
};
pub use options::{
    index_stream, OptionsError, Principal, ReaderOptions, CHECKPOINT_STREAM, INDEX_STREAM_PREFIX,
};
pub use snapshot::{ReaderSnapshot, SealedSnapshot, SnapshotError};

use super::messages::{
    Completion, LogReadResult, OutboundMessage, ReadRequest, ReaderSink, StreamReadResult,
    SubscriptionNotice,
};
use super::options::{index_stream, OptionsError, Principal, ReaderOptions};
use super::snapshot::ReaderSnapshot;
use crate::model::position::LogPosition;
use crate::model::records::PendingEvent;
use crate::observability::logging::{LogLevel, ReaderLog};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;
use uuid::Uuid;

mod index;
mod tail;

/// Events fetched per index-stream read.
pub const STREAM_READ_COUNT: usize = 111;

/// Entries fetched per checkpoint-stream read.
pub const CHECKPOINT_READ_COUNT: usize = 100;

/// Events fetched per transaction-log read.
pub const LOG_READ_COUNT: usize = 111;

/// Backoff applied when a source reported no new data.
pub const RETRY_DELAY_MS: u64 = 250;

/// Wall clock stamping idle notices and log lines.
pub trait WallClock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&mut self) -> u64;
}

/// System clock implementation backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_ms(&mut self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Phase of the two-phase source switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReaderPhase {
    /// Merging the per-type index streams inside the indexed prefix.
    Index,
    /// Tailing the raw transaction log from the handoff position.
    Log,
}

/// Fatal conditions surfaced to the host loop.
///
/// Any of these indicates a bug in the caller or the transport; the reader
/// makes no delivery guarantees past the point of failure.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("completion for stream {stream} arrived without a matching request")]
    UnmatchedStreamCompletion { stream: String },
    #[error("completion for unconfigured stream {stream}")]
    UnknownStream { stream: String },
    #[error("unsupported result {result:?} reading stream {stream}")]
    UnsupportedStreamResult {
        stream: String,
        result: StreamReadResult,
    },
    #[error("transaction-log completion arrived without a matching request")]
    UnmatchedLogCompletion,
    #[error("unsupported result {result:?} reading the transaction log")]
    UnsupportedLogResult { result: LogReadResult },
    #[error("event in stream {stream} carries an unparsable checkpoint tag: {source}")]
    MalformedCheckpointTag {
        stream: String,
        source: serde_json::Error,
    },
    #[error("transaction-log event {event_id} is missing its commit position")]
    MissingLogPosition { event_id: Uuid },
}

/// Point-in-time counters exposed by the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderTelemetry {
    pub phase: ReaderPhase,
    pub delivered_total: u64,
    pub suppressed_total: u64,
    pub idle_total: u64,
    pub buffered_events: usize,
    pub inflight_reads: usize,
    pub checkpoint_position: LogPosition,
    pub last_delivered: LogPosition,
}

/// Mutable state of the index phase.
#[derive(Debug)]
struct IndexState {
    from_positions: BTreeMap<String, i32>,
    buffers: BTreeMap<String, VecDeque<PendingEvent>>,
    eofs: BTreeMap<String, bool>,
    requested: BTreeSet<String>,
    checkpoint_requested: bool,
    checkpoint_probed: bool,
    checkpoint_seq: i32,
    checkpoint_position: LogPosition,
}

impl IndexState {
    fn new(options: &ReaderOptions) -> Self {
        let mut buffers = BTreeMap::new();
        let mut eofs = BTreeMap::new();
        for event_type in &options.event_types {
            let stream = index_stream(event_type);
            buffers.insert(stream.clone(), VecDeque::new());
            eofs.insert(stream, false);
        }
        Self {
            from_positions: options.from_stream_positions.clone(),
            buffers,
            eofs,
            requested: BTreeSet::new(),
            checkpoint_requested: false,
            checkpoint_probed: false,
            checkpoint_seq: -1,
            checkpoint_position: LogPosition::START,
        }
    }

    fn buffered(&self) -> usize {
        self.buffers.values().map(VecDeque::len).sum()
    }

    /// Max-monotone update of a stream's next sequence number.
    fn advance_position(&mut self, stream: &str, next: i32) {
        let entry = self
            .from_positions
            .entry(stream.to_string())
            .or_insert(next);
        if next > *entry {
            *entry = next;
        }
    }
}

/// Mutable state of the log-tail phase.
#[derive(Debug, Default)]
struct TailState {
    requested: bool,
}

/// Multi-type event reader over a log-structured event store.
///
/// Runs as a single-threaded, message-driven state machine: the host feeds
/// read completions through [`handle_completion`] and executes the I/O and
/// timer requests the reader publishes through its [`ReaderSink`]. Events of
/// the configured types are delivered in strictly increasing log-position
/// order, first by merging the per-type index streams inside the indexed
/// prefix, then by tailing the transaction log from the handoff position.
///
/// [`handle_completion`]: TypedEventReader::handle_completion
pub struct TypedEventReader {
    correlation_id: Uuid,
    event_types: BTreeSet<String>,
    stream_to_type: BTreeMap<String, String>,
    resolve_links: bool,
    stop_on_eof: bool,
    max_deliveries: Option<u64>,
    principal: Principal,
    phase: ReaderPhase,
    from_position: LogPosition,
    last_delivered: LogPosition,
    delivered_count: u64,
    suppressed_count: u64,
    idle_count: u64,
    started: bool,
    paused: bool,
    pause_requested: bool,
    disposed: bool,
    index: IndexState,
    tail: TailState,
    clock: Box<dyn WallClock>,
    log: ReaderLog,
}

impl TypedEventReader {
    /// Creates a reader using the system wall clock.
    pub fn new(options: ReaderOptions) -> Result<Self, OptionsError> {
        Self::with_clock(options, Box::new(SystemWallClock))
    }

    /// Creates a reader with an injected clock.
    pub fn with_clock(
        options: ReaderOptions,
        clock: Box<dyn WallClock>,
    ) -> Result<Self, OptionsError> {
        options.validate()?;
        let correlation_id = Uuid::new_v4();
        let mut event_types = BTreeSet::new();
        let mut stream_to_type = BTreeMap::new();
        for event_type in &options.event_types {
            event_types.insert(event_type.clone());
            stream_to_type.insert(index_stream(event_type), event_type.clone());
        }
        let index = IndexState::new(&options);
        Ok(Self {
            correlation_id,
            event_types,
            stream_to_type,
            resolve_links: options.resolve_links,
            stop_on_eof: options.stop_on_eof,
            max_deliveries: options.max_deliveries,
            principal: options.principal,
            phase: ReaderPhase::Index,
            from_position: options.from_position,
            last_delivered: LogPosition::BEFORE_ANY,
            delivered_count: 0,
            suppressed_count: 0,
            idle_count: 0,
            started: false,
            paused: false,
            pause_requested: false,
            disposed: false,
            index,
            tail: TailState::default(),
            clock,
            log: ReaderLog::new(correlation_id.to_string()),
        })
    }

    /// Correlation id stamped on every message this reader exchanges.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Current phase of the source switch.
    pub fn phase(&self) -> ReaderPhase {
        self.phase
    }

    /// High-water mark of delivered positions.
    pub fn last_delivered(&self) -> LogPosition {
        self.last_delivered
    }

    /// Number of events delivered so far.
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count
    }

    /// True once a pause request has fully settled.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True once the reader stopped for good.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The reader's JSON-line log, for the host to drain.
    pub fn log(&self) -> &ReaderLog {
        &self.log
    }

    /// Point-in-time counters.
    pub fn telemetry(&self) -> ReaderTelemetry {
        ReaderTelemetry {
            phase: self.phase,
            delivered_total: self.delivered_count,
            suppressed_total: self.suppressed_count,
            idle_total: self.idle_count,
            buffered_events: self.index.buffered(),
            inflight_reads: self.index.requested.len()
                + usize::from(self.index.checkpoint_requested)
                + usize::from(self.tail.requested),
            checkpoint_position: self.index.checkpoint_position,
            last_delivered: self.last_delivered,
        }
    }

    /// Captures the resume state of the reader.
    pub fn snapshot(&self) -> ReaderSnapshot {
        ReaderSnapshot {
            event_types: self.event_types.iter().cloned().collect(),
            phase: self.phase,
            from_position: self.from_position,
            last_delivered: self.last_delivered,
            delivered_count: self.delivered_count,
            stream_positions: self.index.from_positions.clone(),
            checkpoint_seq: self.index.checkpoint_seq,
            checkpoint_position: self.index.checkpoint_position,
            resolve_links: self.resolve_links,
            stop_on_eof: self.stop_on_eof,
            max_deliveries: self.max_deliveries,
        }
    }

    /// Emits the initial reads: one forward read per configured index
    /// stream plus the backward probe of the checkpoint stream. Idempotent.
    pub fn start(&mut self, sink: &mut dyn ReaderSink) {
        if self.started || self.disposed {
            return;
        }
        self.started = true;
        self.note(LogLevel::Info, "reader", "starting in index phase");
        self.replenish_index_reads(sink);
        self.request_checkpoint_read(false, sink);
    }

    /// Latches a pause request; no new I/O is issued from here on. The
    /// reader reports paused once the last outstanding read completes.
    pub fn pause(&mut self) {
        if self.disposed || self.pause_requested {
            return;
        }
        self.pause_requested = true;
        self.note(LogLevel::Info, "reader", "pause requested");
        self.settle_pause();
    }

    /// Clears the pause latches and re-requests reads for the current phase.
    pub fn resume(&mut self, sink: &mut dyn ReaderSink) {
        if self.disposed || !(self.pause_requested || self.paused) {
            return;
        }
        self.pause_requested = false;
        self.paused = false;
        self.note(LogLevel::Info, "reader", "resuming");
        match self.phase {
            ReaderPhase::Index => {
                self.replenish_index_reads(sink);
                self.request_checkpoint_read(false, sink);
            }
            ReaderPhase::Log => self.request_log_read(false, sink),
        }
    }

    /// Stops the reader for good; completions arriving afterwards are
    /// dropped. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.note(LogLevel::Info, "reader", "disposed");
    }

    /// Routes an inbound completion to the active phase.
    ///
    /// Completions after disposal or with a foreign correlation id are
    /// dropped as stale; protocol violations are fatal.
    pub fn handle_completion(
        &mut self,
        completion: Completion,
        sink: &mut dyn ReaderSink,
    ) -> Result<(), ReaderError> {
        if self.disposed {
            return Ok(());
        }
        match completion {
            Completion::StreamForward(msg) => {
                if msg.correlation_id != self.correlation_id {
                    return Ok(());
                }
                self.on_stream_forward(msg, sink)
            }
            Completion::StreamBackward(msg) => {
                if msg.correlation_id != self.correlation_id {
                    return Ok(());
                }
                self.on_stream_backward(msg, sink)
            }
            Completion::LogForward(msg) => {
                if msg.correlation_id != self.correlation_id {
                    return Ok(());
                }
                self.on_log_forward(msg, sink)
            }
        }
    }

    /// Single delivery chokepoint enforcing the high-water invariant.
    fn deliver(&mut self, pending: PendingEvent, from_index: bool, sink: &mut dyn ReaderSink) {
        if pending.position <= self.last_delivered {
            self.suppressed_count = self.suppressed_count.saturating_add(1);
            return;
        }
        self.last_delivered = pending.position;
        if from_index {
            self.from_position = pending.position;
        }
        self.delivered_count += 1;
        let safe_join_position = if self.stop_on_eof {
            None
        } else if from_index {
            Some(pending.resolved.position_event().log_position)
        } else {
            Some(pending.position.prepare)
        };
        sink.publish(OutboundMessage::Notify(SubscriptionNotice::EventDistributed {
            correlation_id: self.correlation_id,
            position: pending.position,
            safe_join_position,
            progress: pending.progress,
            event: Some(pending.resolved),
        }));
        self.check_max_deliveries(sink);
    }

    fn check_max_deliveries(&mut self, sink: &mut dyn ReaderSink) {
        let Some(max) = self.max_deliveries else {
            return;
        };
        if self.delivered_count < max || self.disposed {
            return;
        }
        self.note(LogLevel::Info, "reader", "delivery budget exhausted");
        self.disposed = true;
        sink.publish(OutboundMessage::Notify(SubscriptionNotice::Eof {
            correlation_id: self.correlation_id,
            max_events_reached: true,
        }));
    }

    fn publish_io(&self, delay: bool, request: ReadRequest, sink: &mut dyn ReaderSink) {
        if delay {
            sink.publish(OutboundMessage::Delayed {
                delay_ms: RETRY_DELAY_MS,
                request,
            });
        } else {
            sink.publish(OutboundMessage::Read(request));
        }
    }

    fn io_allowed(&self) -> bool {
        !(self.disposed || self.paused || self.pause_requested)
    }

    fn has_inflight(&self) -> bool {
        !self.index.requested.is_empty() || self.index.checkpoint_requested || self.tail.requested
    }

    fn settle_pause(&mut self) {
        if self.pause_requested && !self.paused && !self.has_inflight() {
            self.paused = true;
            self.note(LogLevel::Info, "reader", "paused");
        }
    }

    /// Common completion epilogue: settle a pending pause, then tick the
    /// subscription layer.
    fn finish_cycle(&mut self, sink: &mut dyn ReaderSink) {
        self.settle_pause();
        if !self.disposed {
            sink.publish(OutboundMessage::Tick {
                correlation_id: self.correlation_id,
            });
        }
    }

    fn note(&mut self, level: LogLevel, scope: &str, message: &str) {
        let now = self.clock.now_ms();
        let _ = self.log.record(now, level, scope, message);
    }
}

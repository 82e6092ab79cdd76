use super::options::Principal;
use crate::model::position::LogPosition;
use crate::model::records::ResolvedEvent;
use uuid::Uuid;

/// Result code of a stream read completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamReadResult {
    Success,
    NoStream,
    StreamDeleted,
    AccessDenied,
    Error,
}

/// Result code of a transaction-log read completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogReadResult {
    Success,
    AccessDenied,
    Error,
}

/// Completion of a forward or backward stream read.
#[derive(Debug, Clone)]
pub struct StreamReadCompleted {
    pub correlation_id: Uuid,
    pub stream_id: String,
    pub result: StreamReadResult,
    pub events: Vec<ResolvedEvent>,
    pub next_event_number: i32,
    pub last_event_number: i32,
}

/// Completion of a forward transaction-log read.
#[derive(Debug, Clone)]
pub struct LogReadCompleted {
    pub correlation_id: Uuid,
    pub result: LogReadResult,
    pub events: Vec<ResolvedEvent>,
    pub next_position: LogPosition,
    pub eof_position: i64,
}

/// Inbound read completion routed into the reader.
#[derive(Debug, Clone)]
pub enum Completion {
    StreamForward(StreamReadCompleted),
    StreamBackward(StreamReadCompleted),
    LogForward(LogReadCompleted),
}

/// Read request the reader asks the environment to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadRequest {
    StreamForward {
        correlation_id: Uuid,
        stream_id: String,
        from_event_number: i32,
        max_count: usize,
        resolve_links: bool,
        principal: Principal,
    },
    StreamBackward {
        correlation_id: Uuid,
        stream_id: String,
        from_event_number: i32,
        max_count: usize,
        resolve_links: bool,
        principal: Principal,
    },
    LogForward {
        correlation_id: Uuid,
        commit: i64,
        prepare: i64,
        max_count: usize,
        resolve_links: bool,
        principal: Principal,
    },
}

impl ReadRequest {
    /// Stream targeted by the request, when it reads a stream.
    pub fn stream_id(&self) -> Option<&str> {
        match self {
            ReadRequest::StreamForward { stream_id, .. }
            | ReadRequest::StreamBackward { stream_id, .. } => Some(stream_id),
            ReadRequest::LogForward { .. } => None,
        }
    }
}

/// Notice published toward the subscription layer.
#[derive(Debug, Clone)]
pub enum SubscriptionNotice {
    /// A delivered event, or a bare position heartbeat when `event` is
    /// `None`.
    EventDistributed {
        correlation_id: Uuid,
        event: Option<ResolvedEvent>,
        position: LogPosition,
        safe_join_position: Option<i64>,
        progress: f32,
    },
    /// Every configured source is drained.
    Idle {
        correlation_id: Uuid,
        timestamp_ms: u64,
    },
    /// The reader is done, either by budget or by log EOF.
    Eof {
        correlation_id: Uuid,
        max_events_reached: bool,
    },
}

/// Message published through the reader's output port.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Execute the read now.
    Read(ReadRequest),
    /// Republish the enclosed read after `delay_ms`.
    Delayed { delay_ms: u64, request: ReadRequest },
    /// Subscription-facing notice.
    Notify(SubscriptionNotice),
    /// Drives the surrounding subscription layer after each completion.
    Tick { correlation_id: Uuid },
}

/// Output port wired to the environment's publisher.
pub trait ReaderSink {
    fn publish(&mut self, message: OutboundMessage);
}

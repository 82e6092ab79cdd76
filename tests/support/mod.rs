#![allow(dead_code)]

use typefeed::{
    index_stream, CheckpointTag, Completion, EventRecord, LogPosition, LogReadCompleted,
    LogReadResult, OutboundMessage, ReadRequest, ReaderOptions, ReaderSink, ResolvedEvent,
    StreamReadCompleted, StreamReadResult, SubscriptionNotice, TypedEventReader, WallClock,
    CHECKPOINT_STREAM,
};

/// Scripted clock; tests bump `now` by hand.
pub struct ManualClock(pub u64);

impl WallClock for ManualClock {
    fn now_ms(&mut self) -> u64 {
        self.0
    }
}

/// Sink capturing everything the reader publishes.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Vec<OutboundMessage>,
}

impl ReaderSink for RecordingSink {
    fn publish(&mut self, message: OutboundMessage) {
        self.messages.push(message);
    }
}

impl RecordingSink {
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Immediate read requests, in publish order.
    pub fn reads(&self) -> Vec<&ReadRequest> {
        self.messages
            .iter()
            .filter_map(|message| match message {
                OutboundMessage::Read(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Delayed read requests, in publish order.
    pub fn delayed(&self) -> Vec<&ReadRequest> {
        self.messages
            .iter()
            .filter_map(|message| match message {
                OutboundMessage::Delayed { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    /// Immediate and delayed reads together.
    pub fn all_requests(&self) -> Vec<&ReadRequest> {
        self.messages
            .iter()
            .filter_map(|message| match message {
                OutboundMessage::Read(request) | OutboundMessage::Delayed { request, .. } => {
                    Some(request)
                }
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<&SubscriptionNotice> {
        self.messages
            .iter()
            .filter_map(|message| match message {
                OutboundMessage::Notify(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    /// Positions of real event deliveries (heartbeats excluded).
    pub fn delivered_positions(&self) -> Vec<LogPosition> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                SubscriptionNotice::EventDistributed {
                    event: Some(_),
                    position,
                    ..
                } => Some(*position),
                _ => None,
            })
            .collect()
    }

    /// Positions of bare heartbeats (no event attached).
    pub fn heartbeat_positions(&self) -> Vec<LogPosition> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                SubscriptionNotice::EventDistributed {
                    event: None,
                    position,
                    ..
                } => Some(*position),
                _ => None,
            })
            .collect()
    }

    /// `max_events_reached` flags of published EOF notices.
    pub fn eof_flags(&self) -> Vec<bool> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                SubscriptionNotice::Eof {
                    max_events_reached, ..
                } => Some(*max_events_reached),
                _ => None,
            })
            .collect()
    }

    pub fn idle_count(&self) -> usize {
        self.notices()
            .into_iter()
            .filter(|notice| matches!(notice, SubscriptionNotice::Idle { .. }))
            .count()
    }
}

pub fn tag_bytes(commit: i64, prepare: i64) -> Vec<u8> {
    CheckpointTag::at(LogPosition::new(commit, prepare))
        .encode()
        .expect("tag encodes")
}

/// A link-resolved entry of `"$et-<type>"` at sequence `number`, whose tag
/// certifies the original event's log position.
pub fn indexed_event(event_type: &str, number: i32, commit: i64, prepare: i64) -> ResolvedEvent {
    let original = EventRecord::new(format!("{}-source", event_type.to_lowercase()), number, event_type)
        .with_log_position(prepare)
        .as_json();
    let link = EventRecord::new(index_stream(event_type), number, "$>")
        .with_metadata(tag_bytes(commit, prepare))
        .with_log_position(prepare);
    ResolvedEvent::linked(original, link)
}

/// An entry of the `"$et"` checkpoint stream at sequence `seq`.
pub fn checkpoint_entry(seq: i32, commit: i64, prepare: i64) -> ResolvedEvent {
    ResolvedEvent::unlinked(
        EventRecord::new(CHECKPOINT_STREAM, seq, "$checkpoint").with_data(tag_bytes(commit, prepare)),
    )
}

/// A plain transaction-log record.
pub fn log_event(stream: &str, number: i32, event_type: &str, commit: i64, prepare: i64) -> ResolvedEvent {
    ResolvedEvent::unlinked(
        EventRecord::new(stream, number, event_type).with_log_position(prepare),
    )
    .at(LogPosition::new(commit, prepare))
}

/// A transaction-log record that resolves a link living in `"$et-<type>"`.
pub fn log_link_event(event_type: &str, link_number: i32, commit: i64, prepare: i64) -> ResolvedEvent {
    let original = EventRecord::new("source", link_number, event_type).with_log_position(prepare);
    let link = EventRecord::new(index_stream(event_type), link_number, "$>");
    ResolvedEvent::linked(original, link).at(LogPosition::new(commit, prepare))
}

pub fn stream_success(
    reader: &TypedEventReader,
    stream: &str,
    events: Vec<ResolvedEvent>,
    next_event_number: i32,
    last_event_number: i32,
) -> Completion {
    Completion::StreamForward(StreamReadCompleted {
        correlation_id: reader.correlation_id(),
        stream_id: stream.to_string(),
        result: StreamReadResult::Success,
        events,
        next_event_number,
        last_event_number,
    })
}

pub fn stream_empty(reader: &TypedEventReader, stream: &str, next_event_number: i32) -> Completion {
    stream_success(reader, stream, Vec::new(), next_event_number, next_event_number - 1)
}

pub fn stream_missing(reader: &TypedEventReader, stream: &str) -> Completion {
    Completion::StreamForward(StreamReadCompleted {
        correlation_id: reader.correlation_id(),
        stream_id: stream.to_string(),
        result: StreamReadResult::NoStream,
        events: Vec::new(),
        next_event_number: 0,
        last_event_number: -1,
    })
}

pub fn checkpoint_backward(reader: &TypedEventReader, events: Vec<ResolvedEvent>) -> Completion {
    let result = if events.is_empty() {
        StreamReadResult::NoStream
    } else {
        StreamReadResult::Success
    };
    let last = events.first().map(|e| e.position_event().event_number).unwrap_or(-1);
    Completion::StreamBackward(StreamReadCompleted {
        correlation_id: reader.correlation_id(),
        stream_id: CHECKPOINT_STREAM.to_string(),
        result,
        events,
        next_event_number: last,
        last_event_number: last,
    })
}

pub fn checkpoint_forward(reader: &TypedEventReader, events: Vec<ResolvedEvent>) -> Completion {
    let next = events.last().map(|e| e.position_event().event_number + 1).unwrap_or(0);
    Completion::StreamForward(StreamReadCompleted {
        correlation_id: reader.correlation_id(),
        stream_id: CHECKPOINT_STREAM.to_string(),
        result: StreamReadResult::Success,
        events,
        next_event_number: next,
        last_event_number: next - 1,
    })
}

pub fn log_success(
    reader: &TypedEventReader,
    events: Vec<ResolvedEvent>,
    next_position: LogPosition,
    eof_position: i64,
) -> Completion {
    Completion::LogForward(LogReadCompleted {
        correlation_id: reader.correlation_id(),
        result: LogReadResult::Success,
        events,
        next_position,
        eof_position,
    })
}

pub fn log_empty(reader: &TypedEventReader, next_position: LogPosition) -> Completion {
    log_success(reader, Vec::new(), next_position, next_position.prepare.max(0))
}

/// Reader over `types` with a scripted clock frozen at t=1000 ms.
pub fn reader(types: &[&str]) -> TypedEventReader {
    reader_with(ReaderOptions::for_types(types.iter().copied()))
}

pub fn reader_with(options: ReaderOptions) -> TypedEventReader {
    TypedEventReader::with_clock(options, Box::new(ManualClock(1_000))).expect("valid options")
}

/// Reader that has already emitted its initial reads.
pub fn started(types: &[&str]) -> (TypedEventReader, RecordingSink) {
    started_with(ReaderOptions::for_types(types.iter().copied()))
}

pub fn started_with(options: ReaderOptions) -> (TypedEventReader, RecordingSink) {
    let mut reader = reader_with(options);
    let mut sink = RecordingSink::default();
    reader.start(&mut sink);
    (reader, sink)
}

/// Drains a single-type reader straight into the log phase: empty
/// checkpoint probe, then an empty index read for every configured type.
pub fn drained_to_log(types: &[&str], options: ReaderOptions) -> (TypedEventReader, RecordingSink) {
    let (mut reader, mut sink) = started_with(options);
    reader
        .handle_completion(checkpoint_backward(&reader, Vec::new()), &mut sink)
        .expect("checkpoint probe");
    for event_type in types {
        let stream = index_stream(event_type);
        reader
            .handle_completion(stream_empty(&reader, &stream, 0), &mut sink)
            .expect("index drain");
    }
    assert!(matches!(reader.phase(), typefeed::ReaderPhase::Log));
    sink.clear();
    (reader, sink)
}

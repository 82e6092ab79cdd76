//! Log-tail transitions: the forward scan of the transaction log from the
//! handoff position, filtering by type and skipping index-covered events.

use super::{ReaderError, ReaderPhase, TypedEventReader, LOG_READ_COUNT};
use crate::model::position::LogPosition;
use crate::model::records::PendingEvent;
use crate::observability::logging::LogLevel;
use crate::reader::messages::{
    LogReadCompleted, LogReadResult, OutboundMessage, ReadRequest, ReaderSink, SubscriptionNotice,
};

impl TypedEventReader {
    pub(super) fn on_log_forward(
        &mut self,
        msg: LogReadCompleted,
        sink: &mut dyn ReaderSink,
    ) -> Result<(), ReaderError> {
        if self.phase != ReaderPhase::Log || !self.tail.requested {
            return Err(ReaderError::UnmatchedLogCompletion);
        }
        self.tail.requested = false;
        match msg.result {
            LogReadResult::Success => {}
            other => return Err(ReaderError::UnsupportedLogResult { result: other }),
        }
        self.from_position = msg.next_position;
        if msg.events.is_empty() {
            self.deliver_eof_position(msg.next_position, sink);
            if self.stop_on_eof {
                let timestamp_ms = self.clock.now_ms();
                self.idle_count += 1;
                sink.publish(OutboundMessage::Notify(SubscriptionNotice::Idle {
                    correlation_id: self.correlation_id,
                    timestamp_ms,
                }));
                sink.publish(OutboundMessage::Notify(SubscriptionNotice::Eof {
                    correlation_id: self.correlation_id,
                    max_events_reached: false,
                }));
                self.note(LogLevel::Info, "reader", "transaction log exhausted");
                self.disposed = true;
                return Ok(());
            }
            self.request_log_read(true, sink);
        } else {
            for resolved in msg.events {
                if self.disposed {
                    return Ok(());
                }
                if let Some(link) = &resolved.link {
                    // Index-covered record: keep the per-stream bookkeeping
                    // monotone, never deliver through the tail.
                    if self.stream_to_type.contains_key(&link.stream_id) {
                        let stream = link.stream_id.clone();
                        let next = link.event_number.saturating_add(1);
                        self.index.advance_position(&stream, next);
                    }
                    continue;
                }
                if !self.event_types.contains(&resolved.event.event_type) {
                    continue;
                }
                let Some(position) = resolved.position else {
                    return Err(ReaderError::MissingLogPosition {
                        event_id: resolved.event.event_id,
                    });
                };
                let progress = if msg.eof_position > 0 {
                    100.0 * resolved.event.log_position as f32 / msg.eof_position as f32
                } else {
                    100.0
                };
                self.deliver(
                    PendingEvent {
                        resolved,
                        position,
                        progress,
                    },
                    false,
                    sink,
                );
            }
            self.request_log_read(false, sink);
        }
        self.finish_cycle(sink);
        Ok(())
    }

    /// Bare position heartbeat on log EOF, suppressed when the reader is
    /// bounded by `stop_on_eof` or a delivery budget.
    fn deliver_eof_position(&mut self, position: LogPosition, sink: &mut dyn ReaderSink) {
        if self.stop_on_eof || self.max_deliveries.is_some() {
            return;
        }
        sink.publish(OutboundMessage::Notify(SubscriptionNotice::EventDistributed {
            correlation_id: self.correlation_id,
            event: None,
            position,
            safe_join_position: Some(position.prepare),
            progress: 100.0,
        }));
    }

    pub(super) fn request_log_read(&mut self, delay: bool, sink: &mut dyn ReaderSink) {
        if !self.io_allowed() || self.phase != ReaderPhase::Log || self.tail.requested {
            return;
        }
        self.tail.requested = true;
        let request = ReadRequest::LogForward {
            correlation_id: self.correlation_id,
            commit: self.from_position.commit,
            prepare: self.from_position.prepare.max(0),
            max_count: LOG_READ_COUNT,
            resolve_links: true,
            principal: self.principal.clone(),
        };
        self.publish_io(delay, request, sink);
    }
}

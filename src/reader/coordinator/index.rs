//! Index-phase transitions: per-stream buffering, the position-ordered
//! merge gated by the checkpoint boundary, and the handoff trigger.

use super::{
    ReaderError, ReaderPhase, TypedEventReader, CHECKPOINT_READ_COUNT, STREAM_READ_COUNT,
};
use crate::model::position::{CheckpointTag, LogPosition};
use crate::model::records::PendingEvent;
use crate::observability::logging::LogLevel;
use crate::reader::messages::{
    OutboundMessage, ReadRequest, ReaderSink, StreamReadCompleted, StreamReadResult,
    SubscriptionNotice,
};
use crate::reader::options::CHECKPOINT_STREAM;
use std::collections::VecDeque;

impl TypedEventReader {
    pub(super) fn on_stream_forward(
        &mut self,
        msg: StreamReadCompleted,
        sink: &mut dyn ReaderSink,
    ) -> Result<(), ReaderError> {
        if msg.stream_id == CHECKPOINT_STREAM {
            return self.on_checkpoint_completed(msg, sink);
        }
        if self.phase == ReaderPhase::Log {
            // Stale index read that raced the handoff.
            return Ok(());
        }
        let stream = msg.stream_id.clone();
        if !self.stream_to_type.contains_key(&stream) {
            return Err(ReaderError::UnknownStream { stream });
        }
        if !self.index.requested.remove(&stream) {
            return Err(ReaderError::UnmatchedStreamCompletion { stream });
        }
        match msg.result {
            StreamReadResult::NoStream => {
                self.index.eofs.insert(stream.clone(), true);
                self.process_buffers(sink);
                self.request_stream_read(&stream, true, sink);
                self.replenish_index_reads(sink);
            }
            StreamReadResult::Success => {
                self.index.advance_position(&stream, msg.next_event_number);
                let batch_empty = msg.events.is_empty();
                self.index.eofs.insert(stream.clone(), batch_empty);
                for resolved in msg.events {
                    let (key, position, progress) = {
                        let record = resolved.position_event();
                        let tag = CheckpointTag::decode(&record.metadata).map_err(|source| {
                            ReaderError::MalformedCheckpointTag {
                                stream: record.stream_id.clone(),
                                source,
                            }
                        })?;
                        let progress = if msg.last_event_number > 0 {
                            100.0 * record.event_number as f32 / msg.last_event_number as f32
                        } else {
                            100.0
                        };
                        (record.stream_id.clone(), tag.log_position(), progress)
                    };
                    let Some(buffer) = self.index.buffers.get_mut(&key) else {
                        return Err(ReaderError::UnknownStream { stream: key });
                    };
                    buffer.push_back(PendingEvent {
                        resolved,
                        position,
                        progress,
                    });
                }
                self.process_buffers(sink);
                self.request_stream_read(&stream, batch_empty, sink);
                self.replenish_index_reads(sink);
            }
            other => {
                return Err(ReaderError::UnsupportedStreamResult {
                    stream,
                    result: other,
                })
            }
        }
        self.publish_idle_if_drained(sink);
        self.check_switch(sink);
        self.finish_cycle(sink);
        Ok(())
    }

    pub(super) fn on_stream_backward(
        &mut self,
        msg: StreamReadCompleted,
        sink: &mut dyn ReaderSink,
    ) -> Result<(), ReaderError> {
        if msg.stream_id != CHECKPOINT_STREAM {
            return Err(ReaderError::UnmatchedStreamCompletion {
                stream: msg.stream_id,
            });
        }
        self.on_checkpoint_completed(msg, sink)
    }

    /// Advances the safety boundary from a checkpoint-stream completion.
    ///
    /// The checkpoint reader never delivers events; it only moves
    /// `checkpoint_position`, which can itself unblock the merge or make
    /// the handoff condition true.
    fn on_checkpoint_completed(
        &mut self,
        msg: StreamReadCompleted,
        sink: &mut dyn ReaderSink,
    ) -> Result<(), ReaderError> {
        if self.phase == ReaderPhase::Log {
            // Checkpoint state is frozen after the handoff.
            return Ok(());
        }
        if !self.index.checkpoint_requested {
            return Err(ReaderError::UnmatchedStreamCompletion {
                stream: CHECKPOINT_STREAM.to_string(),
            });
        }
        self.index.checkpoint_requested = false;
        match msg.result {
            StreamReadResult::Success | StreamReadResult::NoStream => {}
            other => {
                return Err(ReaderError::UnsupportedStreamResult {
                    stream: CHECKPOINT_STREAM.to_string(),
                    result: other,
                })
            }
        }
        let empty = msg.events.is_empty();
        for resolved in &msg.events {
            let record = resolved.position_event();
            let tag = CheckpointTag::decode(&record.data).map_err(|source| {
                ReaderError::MalformedCheckpointTag {
                    stream: record.stream_id.clone(),
                    source,
                }
            })?;
            if record.event_number > self.index.checkpoint_seq {
                self.index.checkpoint_seq = record.event_number;
                self.index.checkpoint_position = tag.log_position();
            }
        }
        self.process_buffers(sink);
        self.request_checkpoint_read(empty, sink);
        self.replenish_index_reads(sink);
        self.check_switch(sink);
        self.finish_cycle(sink);
        Ok(())
    }

    /// The k-way merge: pops the smallest buffered head while global order
    /// is provable, either because every stream has a head or because the
    /// head sits inside the indexed prefix.
    pub(super) fn process_buffers(&mut self, sink: &mut dyn ReaderSink) {
        while !self.disposed {
            let mut any_eof = false;
            let mut candidate: Option<(String, LogPosition)> = None;
            for stream in self.stream_to_type.keys() {
                match self.index.buffers.get(stream).and_then(VecDeque::front) {
                    None => {
                        if self.index.eofs.get(stream).copied().unwrap_or(false) {
                            any_eof = true;
                        } else {
                            // A read is still outstanding; order is unprovable.
                            return;
                        }
                    }
                    Some(head) => {
                        let better = candidate
                            .as_ref()
                            .map_or(true, |(_, best)| head.position < *best);
                        if better {
                            candidate = Some((stream.clone(), head.position));
                        }
                    }
                }
            }
            let Some((stream, position)) = candidate else {
                break;
            };
            if any_eof && position >= self.index.checkpoint_position {
                // Beyond the indexed prefix with a drained competitor:
                // safety cannot be proven from the index alone.
                return;
            }
            let Some(pending) = self
                .index
                .buffers
                .get_mut(&stream)
                .and_then(VecDeque::pop_front)
            else {
                break;
            };
            self.deliver(pending, true, sink);
        }
    }

    /// Hands off to the log-tail phase once every stream is either drained
    /// or buffered beyond the indexed prefix. Runs after `process_buffers`,
    /// so drained streams have no deliverable head left.
    pub(super) fn check_switch(&mut self, sink: &mut dyn ReaderSink) {
        if self.disposed || self.phase != ReaderPhase::Index {
            return;
        }
        let boundary = self.index.checkpoint_position;
        let ready = self.stream_to_type.keys().all(|stream| {
            if self.index.eofs.get(stream).copied().unwrap_or(false) {
                return true;
            }
            self.index
                .buffers
                .get(stream)
                .and_then(VecDeque::front)
                .map_or(false, |head| head.position >= boundary)
        });
        if !ready {
            return;
        }
        self.phase = ReaderPhase::Log;
        // Outstanding index reads are stale from here on; their completions
        // are dropped by the phase guard.
        self.index.requested.clear();
        self.index.checkpoint_requested = false;
        self.note(
            LogLevel::Info,
            "reader",
            "index exhausted; tailing the transaction log",
        );
        self.request_log_read(false, sink);
    }

    pub(super) fn request_stream_read(
        &mut self,
        stream: &str,
        delay: bool,
        sink: &mut dyn ReaderSink,
    ) {
        if !self.io_allowed() || self.phase != ReaderPhase::Index {
            return;
        }
        if self.index.requested.contains(stream) {
            return;
        }
        if self
            .index
            .buffers
            .get(stream)
            .is_some_and(|buffer| !buffer.is_empty())
        {
            return;
        }
        let from_event_number = self.index.from_positions.get(stream).copied().unwrap_or(0);
        self.index.requested.insert(stream.to_string());
        let request = ReadRequest::StreamForward {
            correlation_id: self.correlation_id,
            stream_id: stream.to_string(),
            from_event_number,
            max_count: STREAM_READ_COUNT,
            resolve_links: self.resolve_links,
            principal: self.principal.clone(),
        };
        self.publish_io(delay, request, sink);
    }

    /// Re-requests every index stream whose buffer is drained and has no
    /// read in flight. The merge can drain a stream on a completion for a
    /// different stream, so all of them are revisited.
    pub(super) fn replenish_index_reads(&mut self, sink: &mut dyn ReaderSink) {
        let streams: Vec<String> = self.stream_to_type.keys().cloned().collect();
        for stream in streams {
            self.request_stream_read(&stream, false, sink);
        }
    }

    pub(super) fn request_checkpoint_read(&mut self, delay: bool, sink: &mut dyn ReaderSink) {
        if !self.io_allowed()
            || self.phase != ReaderPhase::Index
            || self.index.checkpoint_requested
        {
            return;
        }
        self.index.checkpoint_requested = true;
        let request = if self.index.checkpoint_probed {
            ReadRequest::StreamForward {
                correlation_id: self.correlation_id,
                stream_id: CHECKPOINT_STREAM.to_string(),
                from_event_number: self.index.checkpoint_seq + 1,
                max_count: CHECKPOINT_READ_COUNT,
                resolve_links: false,
                principal: self.principal.clone(),
            }
        } else {
            self.index.checkpoint_probed = true;
            ReadRequest::StreamBackward {
                correlation_id: self.correlation_id,
                stream_id: CHECKPOINT_STREAM.to_string(),
                from_event_number: -1,
                max_count: 1,
                resolve_links: false,
                principal: self.principal.clone(),
            }
        };
        self.publish_io(delay, request, sink);
    }

    fn publish_idle_if_drained(&mut self, sink: &mut dyn ReaderSink) {
        if self.disposed || self.phase != ReaderPhase::Index {
            return;
        }
        if self.index.eofs.values().all(|eof| *eof) {
            let timestamp_ms = self.clock.now_ms();
            self.idle_count += 1;
            sink.publish(OutboundMessage::Notify(SubscriptionNotice::Idle {
                correlation_id: self.correlation_id,
                timestamp_ms,
            }));
        }
    }
}

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Severity of a reader log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Canonical uppercase representation used in rendered lines.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds on the log history a reader retains in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRetention {
    pub max_segment_bytes: usize,
    pub max_segments: usize,
}

impl Default for LogRetention {
    fn default() -> Self {
        Self {
            max_segment_bytes: 1 << 20,
            max_segments: 8,
        }
    }
}

/// Rendered JSON lines accumulated before rotation.
#[derive(Debug, Default, Clone)]
pub struct LogSegment {
    lines: Vec<String>,
    bytes: usize,
}

impl LogSegment {
    /// Lines contained in the segment, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Bytes rendered into the segment.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn push(&mut self, line: String) {
        self.bytes = self.bytes.saturating_add(line.len());
        self.lines.push(line);
    }
}

/// Deterministic JSON-line log bound to a single reader instance.
///
/// The host drains rendered lines; nothing is written to disk here.
#[derive(Debug, Clone)]
pub struct ReaderLog {
    retention: LogRetention,
    level: LogLevel,
    reader: String,
    rotated: VecDeque<LogSegment>,
    active: LogSegment,
}

impl ReaderLog {
    /// Creates a log with default retention at `Info`.
    pub fn new(reader: impl Into<String>) -> Self {
        Self::with_retention(reader, LogRetention::default())
    }

    /// Creates a log with explicit retention bounds.
    pub fn with_retention(reader: impl Into<String>, retention: LogRetention) -> Self {
        Self {
            retention,
            level: LogLevel::Info,
            reader: reader.into(),
            rotated: VecDeque::new(),
            active: LogSegment::default(),
        }
    }

    /// Current severity threshold.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Applies a dynamic severity override.
    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    /// Records a line; entries below the current threshold are dropped.
    pub fn record(
        &mut self,
        ts_ms: u64,
        level: LogLevel,
        scope: &str,
        message: &str,
    ) -> Result<(), LoggingError> {
        if level < self.level {
            return Ok(());
        }
        let line = serde_json::to_string(&LogLine {
            ts: ts_ms,
            level: level.as_str(),
            scope,
            reader: &self.reader,
            message,
        })?;
        self.rotate_if_needed(line.len());
        self.active.push(line);
        Ok(())
    }

    /// Rotated segments followed by the active one.
    pub fn segments(&self) -> impl Iterator<Item = &LogSegment> {
        self.rotated.iter().chain(std::iter::once(&self.active))
    }

    /// Every retained line, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments()
            .flat_map(|segment| segment.lines().iter().map(String::as_str))
    }

    fn rotate_if_needed(&mut self, next_line_len: usize) {
        if self.active.bytes + next_line_len <= self.retention.max_segment_bytes {
            return;
        }
        if !self.active.lines.is_empty() {
            self.rotated.push_back(std::mem::take(&mut self.active));
            while self.rotated.len() > self.retention.max_segments {
                self.rotated.pop_front();
            }
        }
    }
}

/// Errors surfaced while rendering log lines.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to serialize log line: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct LogLine<'a> {
    ts: u64,
    level: &'a str,
    scope: &'a str,
    reader: &'a str,
    message: &'a str,
}

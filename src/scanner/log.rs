//! Log sink
//!
//! Append-only, ordered stream of timestamped entries. Probes write to it
//! as they progress; observers either subscribe to the live broadcast or
//! read the accumulated entries once a run finishes.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use tokio::sync::broadcast;

use super::probes::Probe;

const BROADCAST_CAPACITY: usize = 1024;

/// Who emitted an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogSource {
    Probe(Probe),
    System,
}

impl LogSource {
    pub fn label(&self) -> &'static str {
        match self {
            LogSource::Probe(probe) => probe.label(),
            LogSource::System => "SYSTEM",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for LogSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl From<Probe> for LogSource {
    fn from(probe: Probe) -> Self {
        LogSource::Probe(probe)
    }
}

/// Severity derived from the leading `[TAG]` of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
    /// Untagged progress output
    Plain,
}

impl LogLevel {
    /// Classify a message by its tag. Leading indentation and a `->`
    /// marker are skipped so nested payload lines classify too.
    pub fn classify(message: &str) -> Self {
        let trimmed = message.trim_start();
        let trimmed = trimmed.strip_prefix("->").unwrap_or(trimmed).trim_start();
        let upper = trimmed.get(..9).unwrap_or(trimmed).to_ascii_uppercase();

        if upper.starts_with("[ERROR]") {
            LogLevel::Error
        } else if upper.starts_with("[SUCCESS]") {
            LogLevel::Success
        } else if upper.starts_with("[WARN]") {
            LogLevel::Warn
        } else if upper.starts_with("[INFO]") {
            LogLevel::Info
        } else {
            LogLevel::Plain
        }
    }
}

/// One immutable log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(rename = "test")]
    source: LogSource,
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "output")]
    message: String,
}

impl LogEntry {
    pub fn new(source: LogSource, message: impl Into<String>) -> Self {
        Self {
            source,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    pub fn source(&self) -> LogSource {
        self.source
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// ISO-8601 with millisecond precision, `Z` suffix
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::classify(&self.message)
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Caller-owned sink for one engine. Clones share the same buffer.
#[derive(Debug, Clone)]
pub struct LogSink {
    entries: Arc<RwLock<Vec<LogEntry>>>,
    live: broadcast::Sender<LogEntry>,
}

impl LogSink {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            live,
        }
    }

    /// Observe entries as they are appended
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live.subscribe()
    }

    pub fn push(&self, source: LogSource, message: impl Into<String>) {
        let entry = LogEntry::new(source, message);
        // Broadcast under the write lock so subscribers see buffer order.
        let mut entries = self.entries.write();
        let _ = self.live.send(entry.clone());
        entries.push(entry);
    }

    pub fn system(&self, message: impl Into<String>) {
        self.push(LogSource::System, message);
    }

    /// Writer bound to one source
    pub fn emitter(&self, source: impl Into<LogSource>) -> Emitter<'_> {
        Emitter {
            sink: self,
            source: source.into(),
        }
    }

    /// Every entry, in emission order
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Probe-sourced entries only; this is what report exports contain
    pub fn report_entries(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.source != LogSource::System)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink handle that stamps every message with a fixed source
#[derive(Debug, Clone, Copy)]
pub struct Emitter<'a> {
    sink: &'a LogSink,
    source: LogSource,
}

impl Emitter<'_> {
    pub fn emit(&self, message: impl Into<String>) {
        self.sink.push(self.source, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_levels() {
        assert_eq!(LogLevel::classify("[ERROR] boom"), LogLevel::Error);
        assert_eq!(LogLevel::classify("[success] ok"), LogLevel::Success);
        assert_eq!(LogLevel::classify("  -> [WARN] VULNERABILITY DETECTED"), LogLevel::Warn);
        assert_eq!(LogLevel::classify("[INFO] Starting test"), LogLevel::Info);
        assert_eq!(LogLevel::classify("Public IP Address: 1.2.3.4"), LogLevel::Plain);
        assert_eq!(LogLevel::classify(""), LogLevel::Plain);
    }

    #[test]
    fn test_entries_keep_order() {
        let sink = LogSink::new();
        sink.system("first");
        sink.emitter(Probe::Rng).emit("second");
        sink.system("third");

        let messages: Vec<_> = sink.entries().iter().map(|e| e.message().to_string()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert!(sink.entries().windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    }

    #[test]
    fn test_report_entries_exclude_system() {
        let sink = LogSink::new();
        sink.system("[INFO] Starting test: RNG Test...");
        sink.emitter(Probe::Rng).emit("Found 0 duplicates");

        let report = sink.report_entries();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].source(), LogSource::Probe(Probe::Rng));
    }

    #[test]
    fn test_clear_truncates() {
        let sink = LogSink::new();
        sink.system("one");
        sink.clear();
        assert!(sink.entries().is_empty());
        sink.system("two");
        assert_eq!(sink.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_live_entries() {
        let sink = LogSink::new();
        let mut rx = sink.subscribe();

        sink.emitter(Probe::Address).emit("Fetching public IP address...");

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.source().label(), "IP Check");
        assert_eq!(entry.message(), "Fetching public IP address...");
    }

    #[test]
    fn test_entry_serializes_with_report_field_names() {
        let entry = LogEntry::new(LogSource::System, "hello");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["test"], "SYSTEM");
        assert_eq!(json["output"], "hello");
        assert_eq!(json["timestamp"], entry.timestamp_iso());
        assert!(entry.timestamp_iso().ends_with('Z'));
    }
}

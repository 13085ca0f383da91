//! Probe engine
//!
//! Runs the fixed probe battery against a target scope under a shared
//! cancellation token and streams findings into a log sink.

mod cancel;
mod engine;
pub mod headers;
pub mod jwt;
mod log;
pub mod probes;

pub use cancel::CancellationToken;
pub use engine::{ProbeOutcome, ScanEngine, SequenceStatus};
pub use headers::{HeaderReport, HeaderStatus};
pub use log::{LogEntry, LogLevel, LogSink};
pub use probes::Probe;

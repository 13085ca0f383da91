//! Report Generation Module
//!
//! Exports the probe-sourced part of a log sink:
//! - JSON (array of `{test, timestamp, output}`)
//! - CSV (`timestamp,test,output`, every field quoted)

pub mod formats;

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::Path;

use crate::scanner::{LogEntry, LogSink};

/// Entries selected for export
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub entries: Vec<LogEntry>,
}

impl ScanReport {
    /// Snapshot the sink. SYSTEM entries are run bookkeeping and are left out.
    pub fn from_sink(sink: &LogSink) -> Self {
        Self {
            entries: sink.report_entries(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export to JSON format
    pub fn to_json(&self) -> Result<String> {
        formats::json::generate(self)
    }

    /// Export to CSV format
    pub fn to_csv(&self) -> Result<String> {
        Ok(formats::csv::generate(self))
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => self.to_json(),
            ReportFormat::Csv => self.to_csv(),
        }
    }

    /// Save report to file
    pub fn save(&self, path: &Path, format: ReportFormat) -> Result<()> {
        let content = self.render(format)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        tracing::info!(path = %path.display(), entries = self.entries.len(), "report saved");
        Ok(())
    }
}

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    /// Guess from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Probe;

    #[test]
    fn test_report_excludes_system_entries() {
        let sink = LogSink::new();
        sink.system("[INFO] Starting test: RNG Test...");
        sink.emitter(Probe::Rng).emit("Found 0 duplicates in 10000 iterations.");
        sink.system("[SUCCESS] Test completed: RNG Test");

        let report = ScanReport::from_sink(&sink);
        assert_eq!(report.entries.len(), 1);
    }

    #[test]
    fn test_save_writes_file() {
        let sink = LogSink::new();
        sink.emitter(Probe::Address).emit("Public IP Address: 192.0.2.1");
        let report = ScanReport::from_sink(&sink);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        report.save(&path, ReportFormat::Csv).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("timestamp,test,output\n"));
        assert!(written.contains("\"IP Check\""));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ReportFormat::from_path(Path::new("out.JSON")), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_path(Path::new("out.csv")), Some(ReportFormat::Csv));
        assert_eq!(ReportFormat::from_path(Path::new("out.txt")), None);
    }
}

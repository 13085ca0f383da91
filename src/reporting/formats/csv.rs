//! CSV Report Generator

use crate::reporting::ScanReport;

/// Generate CSV report. Rows are newline-joined with no trailing newline.
pub fn generate(report: &ScanReport) -> String {
    let mut rows = Vec::with_capacity(report.entries.len() + 1);
    rows.push("timestamp,test,output".to_string());

    for entry in &report.entries {
        let row = [
            csv_escape(&entry.timestamp_iso()),
            csv_escape(entry.source().label()),
            csv_escape(entry.message()),
        ];
        rows.push(row.join(","));
    }

    rows.join("\n")
}

/// Quote a field unconditionally, doubling embedded quotes
fn csv_escape(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{LogSink, Probe};

    #[test]
    fn test_quotes_are_doubled() {
        let sink = LogSink::new();
        sink.emitter(Probe::Injection)
            .emit("  -> [WARN] VULNERABILITY DETECTED: Response for payload '\"' contains common SQL error strings.");
        let report = ScanReport::from_sink(&sink);

        let csv = generate(&report);
        let row = csv.lines().nth(1).unwrap();

        assert!(row.ends_with(
            r#","SQL/NoSQL Injection","  -> [WARN] VULNERABILITY DETECTED: Response for payload '""' contains common SQL error strings.""#
        ));
        assert!(row.starts_with('"'));
    }

    #[test]
    fn test_header_only_for_empty_report() {
        assert_eq!(generate(&ScanReport::default()), "timestamp,test,output");
    }

    #[test]
    fn test_embedded_comma_and_newline_stay_in_field() {
        assert_eq!(csv_escape("a,b\nc"), "\"a,b\nc\"");
    }
}

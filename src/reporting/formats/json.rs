//! JSON Report Generator

use anyhow::Result;

use crate::reporting::ScanReport;

/// Generate JSON report: a pretty-printed array of entries
pub fn generate(report: &ScanReport) -> Result<String> {
    let json = serde_json::to_string_pretty(&report.entries)?;
    Ok(json)
}

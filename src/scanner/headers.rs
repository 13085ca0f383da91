//! Security headers analysis

use serde::Serialize;

use super::cancel::CancellationToken;
use crate::error::ProbeError;
use crate::http::{HttpClient, Response};

/// Checklist of well-known security headers with the reason each matters
pub const SECURITY_HEADERS: [(&str, &str); 6] = [
    (
        "content-security-policy",
        "Mitigates XSS attacks by restricting resource loading.",
    ),
    (
        "strict-transport-security",
        "Enforces HTTPS to prevent man-in-the-middle attacks.",
    ),
    (
        "x-content-type-options",
        "Prevents MIME-sniffing attacks. Should be \"nosniff\".",
    ),
    (
        "x-frame-options",
        "Prevents clickjacking attacks. Should be \"DENY\" or \"SAMEORIGIN\".",
    ),
    (
        "referrer-policy",
        "Controls how much referrer information is sent with requests.",
    ),
    (
        "permissions-policy",
        "Controls which browser features can be used.",
    ),
];

const NOT_FOUND: &str = "Not Found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderStatus {
    Present,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityHeaderFinding {
    pub name: &'static str,
    pub status: HeaderStatus,
    pub value: String,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderReport {
    pub raw_headers: Vec<(String, String)>,
    pub analysis: Vec<SecurityHeaderFinding>,
}

impl HeaderReport {
    pub fn missing(&self) -> impl Iterator<Item = &SecurityHeaderFinding> {
        self.analysis
            .iter()
            .filter(|f| f.status == HeaderStatus::Missing)
    }
}

/// Grade a response against the checklist
pub fn analyze(response: &Response) -> HeaderReport {
    let analysis = SECURITY_HEADERS
        .iter()
        .map(|&(name, description)| match response.header(name) {
            Some(value) => SecurityHeaderFinding {
                name,
                status: HeaderStatus::Present,
                value,
                description,
            },
            None => SecurityHeaderFinding {
                name,
                status: HeaderStatus::Missing,
                value: NOT_FOUND.to_string(),
                description,
            },
        })
        .collect();

    HeaderReport {
        raw_headers: response.headers.clone(),
        analysis,
    }
}

/// Fetch `url` and grade its headers. Transport errors propagate as-is;
/// a blocked cross-origin redirect keeps its own variant.
pub async fn inspect(
    http: &HttpClient,
    url: &str,
    token: &CancellationToken,
) -> Result<HeaderReport, ProbeError> {
    let response = http.get(url, token).await?;
    let report = analyze(&response);
    tracing::debug!(
        url,
        headers = report.raw_headers.len(),
        missing = report.missing().count(),
        "header inspection"
    );
    Ok(report)
}

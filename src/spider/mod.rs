//! WebSocket endpoint discovery
//!
//! Two-level crawl: the target page first, then each script it links,
//! looking for a `ws://` or `wss://` literal. Progress is logged to the
//! sink under the SYSTEM source.

use anyhow::{Context, Result};
use regex::Regex;
use url::Url;

use crate::error::ProbeError;
use crate::http::HttpClient;
use crate::scanner::{CancellationToken, LogSink};

/// Compiled patterns for the discovery crawl
#[derive(Debug, Clone)]
pub struct Discovery {
    ws_url: Regex,
    script_src: Regex,
}

impl Discovery {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ws_url: Regex::new(r#"wss?://[^\s"'`<>]+"#).context("Invalid WebSocket URL pattern")?,
            script_src: Regex::new(r#"(?i)<script[^>]*?\bsrc=["']([^"']+)["']"#)
                .context("Invalid script pattern")?,
        })
    }

    /// First WebSocket URL literal in `text` that parses, returned exactly
    /// as written
    pub fn find_ws_url(&self, text: &str) -> Option<String> {
        self.ws_url
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|literal| Url::parse(literal).is_ok())
            .map(str::to_string)
    }

    /// `src` attributes of every script tag, in document order
    pub fn script_sources<'t>(&self, html: &'t str) -> Vec<&'t str> {
        self.script_src
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Crawl `base_url` and its linked scripts. Never fails: every outcome
    /// is logged and anything short of a match yields `None`.
    pub async fn discover(
        &self,
        http: &HttpClient,
        base_url: &Url,
        token: &CancellationToken,
        sink: &LogSink,
    ) -> Option<String> {
        sink.system("[INFO] Starting WebSocket URL discovery...");
        sink.system(
            "[WARN] Redirects to other origins are not followed. Discovery may fail if the target page is served from elsewhere.",
        );

        match self.crawl(http, base_url, token, sink).await {
            Ok(found) => found,
            Err(ProbeError::Cancelled) => {
                sink.system("[WARN] Discovery aborted by user.");
                None
            }
            Err(ProbeError::CrossOrigin(reason)) => {
                sink.system(format!(
                    "[ERROR] Discovery failed. This is likely due to a cross-origin redirect on the target server: {}",
                    reason
                ));
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "discovery failed");
                sink.system(format!(
                    "[ERROR] An unexpected error occurred during discovery: {}",
                    e
                ));
                None
            }
        }
    }

    async fn crawl(
        &self,
        http: &HttpClient,
        base_url: &Url,
        token: &CancellationToken,
        sink: &LogSink,
    ) -> Result<Option<String>, ProbeError> {
        token.check()?;
        sink.system(format!("[INFO] Fetching HTML from {}", base_url));
        let html = http.get(base_url.as_str(), token).await?.body_text();

        if let Some(found) = self.find_ws_url(&html) {
            sink.system(format!("[SUCCESS] Found WebSocket URL in HTML: {}", found));
            return Ok(Some(found));
        }

        sink.system("[INFO] No URL found in HTML. Searching linked scripts...");
        let sources = self.script_sources(&html);
        if sources.is_empty() {
            sink.system("[INFO] No linked JavaScript files found.");
            return Ok(None);
        }

        for src in sources {
            token.check()?;

            let script_url = match base_url.join(src) {
                Ok(url) => url,
                Err(e) => {
                    sink.system(format!(
                        "[WARN] Could not fetch or analyze script {}. Reason: {}",
                        src, e
                    ));
                    continue;
                }
            };

            sink.system(format!("[INFO] Analyzing script: {}", script_url));
            match http.get(script_url.as_str(), token).await {
                Ok(response) => {
                    if let Some(found) = self.find_ws_url(&response.body_text()) {
                        sink.system(format!(
                            "[SUCCESS] Found WebSocket URL in {}: {}",
                            script_url, found
                        ));
                        return Ok(Some(found));
                    }
                }
                Err(ProbeError::Cancelled) => return Err(ProbeError::Cancelled),
                Err(e) => {
                    tracing::debug!(script = %script_url, error = %e, "script fetch failed");
                    sink.system(format!(
                        "[WARN] Could not fetch or analyze script {}. Reason: {}",
                        script_url, e
                    ));
                }
            }
        }

        sink.system("[INFO] Discovery finished. No WebSocket URL found.");
        Ok(None)
    }
}

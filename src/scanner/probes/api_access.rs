//! Unauthorized API access check
//!
//! Requests a data endpoint without credentials and classifies the
//! status code: a 200 means the endpoint leaked, 401/403 means it was
//! correctly denied.

use super::ProbeContext;
use crate::error::ProbeError;
use crate::http::Response;

const PREVIEW_CHARS: usize = 200;

/// How the endpoint answered an unauthenticated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessVerdict {
    Exposed,
    Denied,
    Unexpected,
}

impl AccessVerdict {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => AccessVerdict::Exposed,
            401 | 403 => AccessVerdict::Denied,
            _ => AccessVerdict::Unexpected,
        }
    }
}

/// `<base>/<api_path>` with exactly one slash at the seam
pub fn target_url(base_url: &str, api_path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), api_path)
}

pub async fn run(ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
    let scope = ctx.scope()?;
    let log = ctx.emitter();

    let url = target_url(scope.base_url().as_str(), &ctx.config.probes.api_path);
    log.emit(format!("Attempting unauthorized access to: {}", url));
    ctx.token.check()?;

    let response = match ctx.http.get(&url, ctx.token).await {
        Ok(response) => response,
        Err(ProbeError::Cancelled) => return Err(ProbeError::Cancelled),
        Err(e) => {
            tracing::warn!(error = %e, url = %url, "api access request failed");
            log.emit(format!("[ERROR] Network error during API test: {}", e));
            return Ok(());
        }
    };

    log.emit(format!("Received HTTP Status: {}", response.status));

    match AccessVerdict::from_status(response.status) {
        AccessVerdict::Exposed => {
            log.emit("[WARN] VULNERABILITY DETECTED: Unauthorized access was successful (HTTP 200).");
            match json_preview(&response) {
                Some(preview) => log.emit(format!(
                    "Response JSON (first {} chars): {}...",
                    PREVIEW_CHARS, preview
                )),
                None => log.emit("Response was not valid JSON."),
            }
        }
        AccessVerdict::Denied => {
            log.emit("[SUCCESS] API correctly denied access (HTTP 401/403). This is secure.");
        }
        AccessVerdict::Unexpected => {
            log.emit("[INFO] Received an unexpected status code. Further investigation may be needed.");
        }
    }

    Ok(())
}

/// Compact re-serialization of a JSON body, truncated
fn json_preview(response: &Response) -> Option<String> {
    let value: serde_json::Value = response.json().ok()?;
    let compact = serde_json::to_string(&value).ok()?;
    Some(compact.chars().take(PREVIEW_CHARS).collect())
}

//! Public address check

use serde::Deserialize;

use super::ProbeContext;
use crate::error::ProbeError;

/// Body returned by the IP echo endpoint
#[derive(Debug, Deserialize)]
struct IpEcho {
    ip: String,
}

/// Ask the echo service which address our requests come from. Lookup
/// failures are findings, not probe failures.
pub async fn run(ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
    let log = ctx.emitter();
    log.emit("Fetching public IP address...");

    match lookup(ctx).await {
        Ok(ip) => log.emit(format!("Public IP Address: {}", ip)),
        Err(ProbeError::Cancelled) => return Err(ProbeError::Cancelled),
        Err(e) => {
            tracing::warn!(error = %e, "ip lookup failed");
            log.emit(format!("[ERROR] Could not fetch IP address: {}", e));
        }
    }

    Ok(())
}

async fn lookup(ctx: &ProbeContext<'_>) -> Result<String, ProbeError> {
    ctx.token.check()?;
    let response = ctx.http.get(&ctx.config.probes.ip_echo_url, ctx.token).await?;

    if !response.is_success() {
        return Err(ProbeError::Network(format!(
            "API returned status: {}",
            response.status
        )));
    }

    let echo: IpEcho = response
        .json()
        .map_err(|e| ProbeError::Network(format!("invalid response body: {}", e)))?;
    Ok(echo.ip)
}

//! SQL/NoSQL injection heuristics
//!
//! Differential detection against a baseline response: error signatures
//! in the body, content-length divergence between a true/false condition
//! pair, and latency that tracks a requested server-side sleep. Findings
//! are advisory; none of these signals proves exploitability.

use url::Url;

use super::ProbeContext;
use crate::app::HeuristicConfig;
use crate::error::ProbeError;

/// Detection strategy of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Look for database error text in the body
    Error,
    /// Compare body lengths of a true/false condition pair
    Boolean,
    /// Compare latency against the requested sleep
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionPayload {
    pub name: &'static str,
    pub kind: PayloadKind,
    /// Sole payload, or the true condition for boolean pairs
    pub primary: &'static str,
    /// False condition for boolean pairs
    pub secondary_for_boolean: Option<&'static str>,
    /// Sleep requested by time-based payloads
    pub expected_delay_secs: Option<u64>,
}

impl InjectionPayload {
    const fn error(name: &'static str, primary: &'static str) -> Self {
        Self {
            name,
            kind: PayloadKind::Error,
            primary,
            secondary_for_boolean: None,
            expected_delay_secs: None,
        }
    }

    const fn boolean(name: &'static str, primary: &'static str, secondary: &'static str) -> Self {
        Self {
            name,
            kind: PayloadKind::Boolean,
            primary,
            secondary_for_boolean: Some(secondary),
            expected_delay_secs: None,
        }
    }

    const fn time(name: &'static str, primary: &'static str, delay_secs: u64) -> Self {
        Self {
            name,
            kind: PayloadKind::Time,
            primary,
            secondary_for_boolean: None,
            expected_delay_secs: Some(delay_secs),
        }
    }
}

/// Payload catalog, applied in order
pub const PAYLOADS: [InjectionPayload; 6] = [
    InjectionPayload::error("Classic Error", "'"),
    InjectionPayload::error("Numeric Error", "1 OR 1=1"),
    InjectionPayload::boolean("Boolean Logic (AND)", "' AND '1'='1", "' AND '1'='2"),
    InjectionPayload::time("Time-Based MySQL (5s)", "' AND SLEEP(5)--", 5),
    InjectionPayload::time("Time-Based PostgreSQL (5s)", "'||pg_sleep(5)--", 5),
    InjectionPayload::time("Time-Based MSSQL (5s)", "'; WAITFOR DELAY '0:0:5'--", 5),
];

/// Case-insensitive substrings that betray a database error
pub const SQL_ERROR_SIGNATURES: [&str; 6] = [
    "syntax error",
    "sql error",
    "mysql",
    "unclosed quotation mark",
    "invalid input",
    "ora-",
];

pub fn contains_sql_error(body: &str) -> bool {
    let body = body.to_lowercase();
    SQL_ERROR_SIGNATURES.iter().any(|sig| body.contains(sig))
}

/// True/false bodies differ by more than the threshold
pub fn boolean_differs(true_len: usize, false_len: usize, threshold: usize) -> bool {
    true_len.abs_diff(false_len) > threshold
}

/// Latency is consistent with the requested sleep and clearly above the
/// baseline. Both must hold so a uniformly slow target is not flagged.
pub fn time_delayed(
    observed_ms: u64,
    baseline_ms: u64,
    delay_secs: u64,
    heuristics: &HeuristicConfig,
) -> bool {
    let floor = (delay_secs * 1000).saturating_sub(heuristics.time_tolerance_ms);
    let over_baseline = observed_ms as f64 > baseline_ms as f64 * heuristics.time_baseline_factor;
    observed_ms > floor && over_baseline
}

/// `base` with `param` set to `value`. The first existing occurrence is
/// replaced in place and later duplicates dropped; otherwise appended.
pub fn build_url(base: &Url, param: &str, value: &str) -> Url {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut set = false;

    for (key, existing) in base.query_pairs().into_owned() {
        if key == param {
            if !set {
                pairs.push((key, value.to_string()));
                set = true;
            }
        } else {
            pairs.push((key, existing));
        }
    }

    if !set {
        pairs.push((param.to_string(), value.to_string()));
    }

    let mut url = base.clone();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url
}

/// Reference response captured before any payload
#[derive(Debug, Clone, Copy)]
struct Baseline {
    latency_ms: u64,
    length: usize,
}

struct InjectionRun<'c, 'a> {
    ctx: &'c ProbeContext<'a>,
    base: &'a Url,
    param: &'a str,
}

impl InjectionRun<'_, '_> {
    async fn fetch(&self, value: &str) -> Result<crate::http::Response, ProbeError> {
        self.ctx.token.check()?;
        let url = build_url(self.base, self.param, value);
        self.ctx.http.get(url.as_str(), self.ctx.token).await
    }

    async fn baseline(&self) -> Result<Baseline, ProbeError> {
        let value = format!("baselineTest{}", rand::random::<f64>());
        let response = self.fetch(&value).await?;
        Ok(Baseline {
            latency_ms: response.duration_ms,
            length: response.text_len(),
        })
    }

    /// Apply one payload; `Ok(true)` when it looks vulnerable
    async fn evaluate(
        &self,
        payload: &InjectionPayload,
        baseline: Baseline,
    ) -> Result<bool, ProbeError> {
        let log = self.ctx.emitter();
        let heuristics = &self.ctx.config.heuristics;

        match payload.kind {
            PayloadKind::Error => {
                let body = self.fetch(payload.primary).await?.body_text();
                if contains_sql_error(&body) {
                    log.emit(format!(
                        "  -> [WARN] VULNERABILITY DETECTED: Response for payload '{}' contains common SQL error strings.",
                        payload.primary
                    ));
                    Ok(true)
                } else {
                    log.emit("  -> [SUCCESS] No obvious error strings found.");
                    Ok(false)
                }
            }
            PayloadKind::Boolean => {
                let Some(secondary) = payload.secondary_for_boolean else {
                    return Ok(false);
                };
                let true_len = self.fetch(payload.primary).await?.text_len();
                let false_len = self.fetch(secondary).await?.text_len();

                log.emit(format!(
                    "  -> True Response Length: {}, False Response Length: {}",
                    true_len, false_len
                ));
                if boolean_differs(true_len, false_len, heuristics.boolean_length_threshold) {
                    log.emit("  -> [WARN] VULNERABILITY DETECTED: True and False conditions produced significantly different responses.");
                    Ok(true)
                } else {
                    log.emit("  -> [SUCCESS] No significant content length difference found between True/False conditions.");
                    Ok(false)
                }
            }
            PayloadKind::Time => {
                let Some(delay_secs) = payload.expected_delay_secs else {
                    return Ok(false);
                };
                let observed = self.fetch(payload.primary).await?.duration_ms;

                log.emit(format!("  -> Response time: {}ms", observed));
                if time_delayed(observed, baseline.latency_ms, delay_secs, heuristics) {
                    log.emit("  -> [WARN] VULNERABILITY DETECTED: Response took significantly longer than baseline, indicating a time-based vulnerability.");
                    Ok(true)
                } else {
                    log.emit("  -> [SUCCESS] Response time is within normal limits.");
                    Ok(false)
                }
            }
        }
    }
}

pub async fn run(ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
    let scope = ctx.scope()?;
    let log = ctx.emitter();
    let probe = InjectionRun {
        ctx,
        base: scope.base_url(),
        param: scope.injection_parameter(),
    };

    log.emit(format!(
        "Targeting URL: {} with parameter '{}'",
        scope.base_url(),
        scope.injection_parameter()
    ));

    log.emit("[INFO] Establishing baseline response...");
    let baseline = probe.baseline().await?;
    log.emit(format!(
        "[INFO] Baseline established: {}ms, {} bytes.",
        baseline.latency_ms, baseline.length
    ));

    let mut found = 0usize;
    for payload in &PAYLOADS {
        ctx.token.check()?;
        log.emit(format!("[INFO] Testing Payload: [{}]...", payload.name));

        match probe.evaluate(payload, baseline).await {
            Ok(true) => found += 1,
            Ok(false) => {}
            Err(ProbeError::Cancelled) => return Err(ProbeError::Cancelled),
            Err(e) => {
                tracing::warn!(payload = payload.name, error = %e, "injection payload failed");
                log.emit(format!("  -> [ERROR] Network error during test: {}", e));
            }
        }

        ctx.token.sleep(ctx.config.probes.injection_delay()).await?;
    }

    if found > 0 {
        log.emit(format!(
            "[WARN] Injection test complete. Found {} potential vulnerabilities.",
            found
        ));
    } else {
        log.emit("[SUCCESS] Injection test complete. No obvious vulnerabilities found with the tested payloads.");
    }

    Ok(())
}

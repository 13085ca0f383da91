//! Scan engine orchestration
//!
//! Runs one probe at a time against a shared log sink. Every probe is a
//! failure boundary: whatever happens inside, the runner turns it into
//! exactly one terminal log entry and a `ProbeOutcome`.

use async_trait::async_trait;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use super::cancel::CancellationToken;
use super::headers::{self, HeaderReport};
use super::log::LogSink;
use super::probes::{Probe, ProbeContext};
use crate::app::Config;
use crate::error::ProbeError;
use crate::http::HttpClient;
use crate::scope::TargetScope;
use crate::spider::Discovery;

/// How a single probe invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Completed,
    Aborted,
    Failed(String),
    /// Never started: the probe needs a scope and none was set
    Refused,
}

/// Captured result of one LIVE step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub probe: Probe,
    pub outcome: ProbeOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    Completed,
    Aborted,
    Refused,
}

/// Summary of a sequenced run. Steps skipped after an abort are absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceReport {
    pub status: SequenceStatus,
    pub steps: Vec<StepResult>,
}

impl SequenceReport {
    pub fn failed(&self) -> impl Iterator<Item = &StepResult> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, ProbeOutcome::Failed(_)))
    }
}

/// A unit the engine can run. `Probe` is the production implementation.
#[async_trait]
pub trait Step: Send + Sync {
    fn probe(&self) -> Probe;

    fn requires_scope(&self) -> bool {
        self.probe().requires_scope()
    }

    async fn execute(&self, ctx: &ProbeContext<'_>) -> Result<(), ProbeError>;
}

#[async_trait]
impl Step for Probe {
    fn probe(&self) -> Probe {
        *self
    }

    async fn execute(&self, ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
        Probe::execute(self, ctx).await
    }
}

/// Main scan engine
pub struct ScanEngine {
    /// HTTP client shared by every probe
    http: HttpClient,

    /// Configuration
    config: Config,

    /// Caller-owned finding stream
    sink: LogSink,

    /// WebSocket endpoint crawler
    discovery: Discovery,
}

impl ScanEngine {
    /// Create a new scan engine writing to `sink`
    pub fn new(config: &Config, sink: LogSink) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpClient::new(&config.http)?,
            config: config.clone(),
            sink,
            discovery: Discovery::new()?,
        })
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    fn context<'a>(
        &'a self,
        probe: Probe,
        scope: Option<&'a TargetScope>,
        token: &'a CancellationToken,
    ) -> ProbeContext<'a> {
        ProbeContext {
            probe,
            http: &self.http,
            config: &self.config,
            scope,
            token,
            sink: &self.sink,
        }
    }

    /// Run a single probe. Clears the sink first unless the probe is
    /// refused for lack of a scope.
    pub async fn run_probe<S: Step>(
        &self,
        step: &S,
        scope: Option<&TargetScope>,
        token: &CancellationToken,
    ) -> ProbeOutcome {
        let label = step.probe().label();

        if step.requires_scope() && scope.is_none() {
            self.sink
                .system("[WARN] Please set a target scope before running this test.");
            return ProbeOutcome::Refused;
        }

        let span = tracing::info_span!("probe", run_id = %Uuid::new_v4(), probe = label);

        async {
            self.sink.clear();
            self.sink.system(format!("[INFO] Starting test: {}...", label));

            let ctx = self.context(step.probe(), scope, token);
            let result = match token.check() {
                Ok(()) => step.execute(&ctx).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    self.sink.system(format!("[SUCCESS] Test completed: {}", label));
                    ProbeOutcome::Completed
                }
                Err(ProbeError::Cancelled) => {
                    self.sink.system(format!("[WARN] Test aborted by user: {}", label));
                    ProbeOutcome::Aborted
                }
                Err(e) => {
                    tracing::warn!(error = %e, "probe failed");
                    self.sink
                        .system(format!("[ERROR] Test failed: {}. Reason: {}", label, e));
                    ProbeOutcome::Failed(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run `steps` strictly in order. A failing step is logged and the
    /// sequence moves on; cancellation stops it.
    pub async fn run_sequence<S: Step>(
        &self,
        steps: &[S],
        scope: Option<&TargetScope>,
        token: &CancellationToken,
    ) -> SequenceReport {
        let Some(scope) = scope else {
            self.sink
                .system("[WARN] Please set a target scope before running LIVE Mode.");
            return SequenceReport {
                status: SequenceStatus::Refused,
                steps: Vec::new(),
            };
        };

        let span = tracing::info_span!("live", run_id = %Uuid::new_v4(), steps = steps.len());

        async {
            self.sink.clear();
            self.sink.system("[INFO] Starting LIVE Mode...");

            let mut results = Vec::with_capacity(steps.len());

            for (index, step) in steps.iter().enumerate() {
                if token.is_cancelled() {
                    return self.aborted(results);
                }

                let probe = step.probe();
                self.sink
                    .system(format!("[INFO] Running sub-test: {}", probe.label()));

                let ctx = self.context(probe, Some(scope), token);
                match step.execute(&ctx).await {
                    Ok(()) => {
                        self.sink
                            .system(format!("[SUCCESS] Sub-test completed: {}", probe.label()));
                        results.push(StepResult {
                            probe,
                            outcome: ProbeOutcome::Completed,
                        });
                    }
                    Err(ProbeError::Cancelled) => {
                        results.push(StepResult {
                            probe,
                            outcome: ProbeOutcome::Aborted,
                        });
                        return self.aborted(results);
                    }
                    Err(e) => {
                        tracing::warn!(probe = probe.label(), error = %e, "sub-test failed");
                        self.sink.system(format!(
                            "[ERROR] Sub-test failed: {}. Reason: {}",
                            probe.label(),
                            e
                        ));
                        results.push(StepResult {
                            probe,
                            outcome: ProbeOutcome::Failed(e.to_string()),
                        });
                    }
                }

                // Pacing between steps; a cancel here is reported by the
                // check at the top of the next iteration.
                if index + 1 < steps.len() {
                    let _ = token.sleep(self.config.probes.live_step_delay()).await;
                }
            }

            self.sink.system("[SUCCESS] LIVE Mode completed.");
            SequenceReport {
                status: SequenceStatus::Completed,
                steps: results,
            }
        }
        .instrument(span)
        .await
    }

    fn aborted(&self, steps: Vec<StepResult>) -> SequenceReport {
        self.sink.system("[WARN] LIVE Mode aborted by user.");
        SequenceReport {
            status: SequenceStatus::Aborted,
            steps,
        }
    }

    /// Run every primary probe in LIVE order
    pub async fn run_live(
        &self,
        scope: Option<&TargetScope>,
        token: &CancellationToken,
    ) -> SequenceReport {
        self.run_sequence(&Probe::LIVE_ORDER, scope, token).await
    }

    /// Look for a WebSocket endpoint referenced by the target page
    pub async fn discover(&self, base_url: &Url, token: &CancellationToken) -> Option<String> {
        self.discovery
            .discover(&self.http, base_url, token, &self.sink)
            .await
    }

    /// Fetch `url` and grade its security headers
    pub async fn inspect_headers(
        &self,
        url: &str,
        token: &CancellationToken,
    ) -> Result<HeaderReport, ProbeError> {
        headers::inspect(&self.http, url, token).await
    }
}

//! Primary probes
//!
//! The probe set is closed: each variant maps to one module below and is
//! dispatched with a `match`, never through a registry.

pub mod address;
pub mod api_access;
pub mod fingerprint;
pub mod injection;
pub mod rng;
pub mod websocket;

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use super::cancel::CancellationToken;
use super::log::{Emitter, LogSink};
use crate::app::Config;
use crate::error::ProbeError;
use crate::http::HttpClient;
use crate::scope::TargetScope;

/// Identifier of a primary probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
pub enum Probe {
    #[value(name = "ip")]
    Address,
    #[value(name = "api")]
    ApiAccess,
    #[value(name = "rng")]
    Rng,
    #[value(name = "fingerprint")]
    Fingerprint,
    #[value(name = "websocket")]
    WebSocket,
    #[value(name = "injection")]
    Injection,
}

impl Probe {
    /// Execution order of a LIVE run
    pub const LIVE_ORDER: [Probe; 6] = [
        Probe::Address,
        Probe::ApiAccess,
        Probe::Rng,
        Probe::Fingerprint,
        Probe::WebSocket,
        Probe::Injection,
    ];

    /// Display name used as the log source
    pub fn label(&self) -> &'static str {
        match self {
            Probe::Address => "IP Check",
            Probe::ApiAccess => "API Access Test",
            Probe::Rng => "RNG Test",
            Probe::Fingerprint => "Fingerprint Check",
            Probe::WebSocket => "WebSocket Intercept",
            Probe::Injection => "SQL/NoSQL Injection",
        }
    }

    /// Whether the probe needs a target scope to start
    pub fn requires_scope(&self) -> bool {
        matches!(
            self,
            Probe::ApiAccess | Probe::WebSocket | Probe::Injection
        )
    }

    /// Run the probe body. Findings go to the sink; the result only
    /// reports how the body ended.
    pub async fn execute(&self, ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
        ctx.token.check()?;
        tracing::debug!(probe = self.label(), "probe body start");

        let result = match self {
            Probe::Address => address::run(ctx).await,
            Probe::ApiAccess => api_access::run(ctx).await,
            Probe::Rng => rng::run(ctx).await,
            Probe::Fingerprint => fingerprint::run(ctx).await,
            Probe::WebSocket => websocket::run(ctx).await,
            Probe::Injection => injection::run(ctx).await,
        };

        tracing::debug!(probe = self.label(), ok = result.is_ok(), "probe body end");
        result
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything a probe body may touch during one invocation
#[derive(Clone, Copy)]
pub struct ProbeContext<'a> {
    pub probe: Probe,
    pub http: &'a HttpClient,
    pub config: &'a Config,
    pub scope: Option<&'a TargetScope>,
    pub token: &'a CancellationToken,
    pub sink: &'a LogSink,
}

impl<'a> ProbeContext<'a> {
    pub fn scope(&self) -> Result<&'a TargetScope, ProbeError> {
        self.scope.ok_or(ProbeError::MissingScope)
    }

    /// Writer stamped with this probe as the source
    pub fn emitter(&self) -> Emitter<'a> {
        self.sink.emitter(self.probe)
    }
}

//! Application configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP client settings
    pub http: HttpConfig,

    /// Per-probe settings
    pub probes: ProbeConfig,

    /// Differential heuristic thresholds
    pub heuristics: HeuristicConfig,

    /// Default target scope
    pub target: TargetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds; unset leaves the transport default
    pub request_timeout: Option<u64>,

    /// Maximum redirect depth
    pub max_redirects: usize,

    /// Follow redirects that leave the requested origin
    pub allow_cross_origin_redirects: bool,

    /// User agent string
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Public IP echo endpoint for the address check
    pub ip_echo_url: String,

    /// Path appended to the base URL by the API access check
    pub api_path: String,

    /// Seconds the WebSocket probe waits for the connection to open
    pub websocket_timeout_secs: u64,

    /// Payload sent once the WebSocket is open
    pub websocket_message: String,

    /// Samples drawn by the RNG check
    pub rng_samples: usize,

    /// Collisions tolerated before the RNG check warns
    pub rng_collision_threshold: usize,

    /// Delay between LIVE mode steps in milliseconds
    pub live_step_delay_ms: u64,

    /// Delay between injection payloads in milliseconds
    pub injection_delay_ms: u64,
}

/// Tuned thresholds for the injection heuristics. None of these are
/// protocol requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Body length difference (chars) that marks a boolean pair as distinct
    pub boolean_length_threshold: usize,

    /// Observed latency must exceed the baseline by this factor
    pub time_baseline_factor: f64,

    /// Slack subtracted from the requested sleep before comparing, in ms
    pub time_tolerance_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: Option<String>,
    pub websocket_url: Option<String>,
    pub injection_parameter: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            max_redirects: 10,
            allow_cross_origin_redirects: false,
            user_agent: format!("probekit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ip_echo_url: "https://api64.ipify.org?format=json".to_string(),
            api_path: "/api/game/results".to_string(),
            websocket_timeout_secs: 15,
            websocket_message: "probekit WebSocket Test".to_string(),
            rng_samples: 10_000,
            rng_collision_threshold: 2,
            live_step_delay_ms: 500,
            injection_delay_ms: 300,
        }
    }
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            boolean_length_threshold: 100,
            time_baseline_factor: 2.0,
            time_tolerance_ms: 500,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            websocket_url: None,
            injection_parameter: "q".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn live_step_delay(&self) -> Duration {
        Duration::from_millis(self.live_step_delay_ms)
    }

    pub fn injection_delay(&self) -> Duration {
        Duration::from_millis(self.injection_delay_ms)
    }

    pub fn websocket_timeout(&self) -> Duration {
        Duration::from_secs(self.websocket_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(|source| {
                ConfigError::ReadError {
                    path: config_path.display().to_string(),
                    source,
                }
            })?;

            let config: Config = toml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(e.to_string()))
                .with_context(|| format!("Failed to parse {:?}", config_path))?;

            tracing::info!("Loaded configuration from {:?}", config_path);
            Ok(config)
        } else if path.is_some() {
            Err(ConfigError::ReadError {
                path: config_path.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
            .into())
        } else {
            tracing::debug!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.request_timeout == Some(0) {
            return Err(invalid("http.request_timeout", "must be greater than 0"));
        }

        if self.probes.websocket_timeout_secs == 0 {
            return Err(invalid("probes.websocket_timeout_secs", "must be greater than 0"));
        }

        if self.probes.rng_samples == 0 {
            return Err(invalid("probes.rng_samples", "must be greater than 0"));
        }

        if url::Url::parse(&self.probes.ip_echo_url).is_err() {
            return Err(invalid("probes.ip_echo_url", "must be an absolute URL"));
        }

        if !self.probes.api_path.starts_with('/') {
            return Err(invalid("probes.api_path", "must start with '/'"));
        }

        if !self.heuristics.time_baseline_factor.is_finite()
            || self.heuristics.time_baseline_factor < 1.0
        {
            return Err(invalid("heuristics.time_baseline_factor", "must be a finite value >= 1.0"));
        }

        Ok(())
    }

    /// Get default configuration file path
    fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "probekit", "probekit")
            .context("Failed to determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "probekit", "probekit")
            .context("Failed to determine data directory")?;

        Ok(dirs.data_dir().to_path_buf())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

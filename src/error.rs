//! Error types for probekit
//!
//! Every probe is a failure boundary: the engine turns these into log
//! entries, so the `Display` text doubles as the user-facing reason.

use thiserror::Error;

/// Errors raised while running a probe or an auxiliary operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The run's cancellation token fired
    #[error("Test aborted by user")]
    Cancelled,

    /// Transport-level failure (connection refused, malformed response, ...)
    #[error("{0}")]
    Network(String),

    /// A redirect tried to leave the requested origin
    #[error("Cross-origin request blocked: {0}")]
    CrossOrigin(String),

    /// The WebSocket did not reach the open state in time
    #[error("Connection timed out after {0} seconds.")]
    Timeout(u64),

    /// WebSocket handshake or stream failure
    #[error("{0}")]
    WebSocket(String),

    /// A probe that needs a target scope was started without one
    #[error("Please set a target scope before running this test.")]
    MissingScope,

    /// A request URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Target scope validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Invalid WebSocket URL '{url}': {reason}")]
    InvalidWebSocketUrl { url: String, reason: String },

    #[error("Injection parameter must not be empty")]
    EmptyParameter,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {field} - {reason}")]
    ValidationError { field: String, reason: String },
}

/// Trait for providing user-friendly hints
pub trait UserHint {
    fn user_hint(&self) -> String;
}

impl UserHint for ProbeError {
    fn user_hint(&self) -> String {
        match self {
            ProbeError::CrossOrigin(_) => {
                "The target redirected to another origin, which this tool does not follow. \
                 Try testing a specific endpoint on the final origin, or set \
                 http.allow_cross_origin_redirects = true if the hop is expected."
                    .into()
            }
            ProbeError::Timeout(secs) => {
                format!("No WebSocket handshake completed within {}s. Check that the endpoint is reachable.", secs)
            }
            ProbeError::InvalidUrl(_) => {
                "Use an absolute URL including the scheme, e.g. https://example.com/".into()
            }
            ProbeError::MissingScope => {
                "Provide --base-url and --param (or a [target] section in the config).".into()
            }
            _ => self.to_string(),
        }
    }
}

impl UserHint for ScopeError {
    fn user_hint(&self) -> String {
        match self {
            ScopeError::InvalidBaseUrl { url, .. } => {
                format!("'{}' is not a valid target. Use a full http:// or https:// URL.", url)
            }
            ScopeError::InvalidWebSocketUrl { url, .. } => {
                format!("'{}' is not a valid WebSocket endpoint. Use a full ws:// or wss:// URL.", url)
            }
            ScopeError::EmptyParameter => {
                "Set the query parameter to inject into, e.g. --param q".into()
            }
        }
    }
}

impl UserHint for ConfigError {
    fn user_hint(&self) -> String {
        match self {
            ConfigError::ReadError { path, .. } => {
                format!("Could not read '{}'. Check if the file exists and you have read permissions.", path)
            }
            ConfigError::ParseError(_) => {
                "The configuration file has invalid syntax. Check for TOML formatting errors.".into()
            }
            ConfigError::ValidationError { field, reason } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        assert_eq!(
            ProbeError::Timeout(15).to_string(),
            "Connection timed out after 15 seconds."
        );
    }

    #[test]
    fn test_invalid_url_hint() {
        let hint = ProbeError::InvalidUrl("x: relative URL without a base".into()).user_hint();
        assert!(hint.contains("http://"));
    }

    #[test]
    fn test_cross_origin_hint_is_actionable() {
        let hint = ProbeError::CrossOrigin("a -> b".into()).user_hint();
        assert!(hint.contains("allow_cross_origin_redirects"));
    }
}

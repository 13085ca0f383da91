//! Target Scope Module
//!
//! The single target a run operates against: a base URL, the query
//! parameter to inject into, and an optional WebSocket endpoint.
//! Validated once at construction and never mutated afterwards.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::ScopeError;

/// Validated target scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetScope {
    base_url: Url,
    websocket_url: Option<Url>,
    injection_parameter: String,
}

impl TargetScope {
    /// Validate raw inputs into a scope.
    ///
    /// An empty or whitespace-only WebSocket URL is treated as absent.
    pub fn new(
        base_url: &str,
        websocket_url: Option<&str>,
        injection_parameter: &str,
    ) -> Result<Self, ScopeError> {
        let base_url = parse_with_scheme(base_url, &["http", "https"]).map_err(|reason| {
            ScopeError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason,
            }
        })?;

        let websocket_url = match websocket_url.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_with_scheme(raw, &["ws", "wss"]).map_err(|reason| {
                ScopeError::InvalidWebSocketUrl {
                    url: raw.to_string(),
                    reason,
                }
            })?),
            None => None,
        };

        let injection_parameter = injection_parameter.trim();
        if injection_parameter.is_empty() {
            return Err(ScopeError::EmptyParameter);
        }

        Ok(Self {
            base_url,
            websocket_url,
            injection_parameter: injection_parameter.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn websocket_url(&self) -> Option<&Url> {
        self.websocket_url.as_ref()
    }

    pub fn injection_parameter(&self) -> &str {
        &self.injection_parameter
    }

    /// Copy of this scope with a different WebSocket endpoint, validated
    /// the same way as at construction.
    pub fn with_websocket_url(&self, websocket_url: &str) -> Result<Self, ScopeError> {
        Self::new(
            self.base_url.as_str(),
            Some(websocket_url),
            &self.injection_parameter,
        )
    }
}

impl fmt::Display for TargetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [param: {}]", self.base_url, self.injection_parameter)?;
        if let Some(ws) = &self.websocket_url {
            write!(f, " [ws: {}]", ws)?;
        }
        Ok(())
    }
}

fn parse_with_scheme(raw: &str, schemes: &[&str]) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;

    if !schemes.contains(&url.scheme()) {
        return Err(format!(
            "unsupported scheme '{}' (expected {})",
            url.scheme(),
            schemes.join(" or ")
        ));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_scope() {
        let scope = TargetScope::new(
            "https://casino.example.com/api/search",
            Some("wss://casino.example.com/socket"),
            "q",
        )
        .unwrap();

        assert_eq!(scope.base_url().host_str(), Some("casino.example.com"));
        assert_eq!(
            scope.websocket_url().map(Url::as_str),
            Some("wss://casino.example.com/socket")
        );
        assert_eq!(scope.injection_parameter(), "q");
    }

    #[test]
    fn test_empty_websocket_is_absent() {
        let scope = TargetScope::new("http://localhost:8080", Some("  "), "id").unwrap();
        assert!(scope.websocket_url().is_none());
    }

    #[test]
    fn test_relative_base_url_rejected() {
        let err = TargetScope::new("/api/search", None, "q").unwrap_err();
        assert!(matches!(err, ScopeError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_wrong_schemes_rejected() {
        assert!(matches!(
            TargetScope::new("ftp://example.com", None, "q"),
            Err(ScopeError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            TargetScope::new("https://example.com", Some("https://example.com/ws"), "q"),
            Err(ScopeError::InvalidWebSocketUrl { .. })
        ));
    }

    #[test]
    fn test_empty_parameter_rejected() {
        assert_eq!(
            TargetScope::new("https://example.com", None, " "),
            Err(ScopeError::EmptyParameter)
        );
    }

    #[test]
    fn test_with_websocket_url_revalidates() {
        let scope = TargetScope::new("https://example.com", None, "q").unwrap();
        let updated = scope.with_websocket_url("ws://example.com/live").unwrap();

        assert!(scope.websocket_url().is_none());
        assert_eq!(updated.websocket_url().unwrap().as_str(), "ws://example.com/live");
        assert!(scope.with_websocket_url("not a url").is_err());
    }
}

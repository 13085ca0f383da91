//! JWT (JSON Web Token) inspection
//!
//! Offline decoding only: splits the token, decodes header and claims,
//! and reports lifetime claims. Signatures are shown, never verified.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// JWT token structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtToken {
    /// Decoded header
    pub header: JwtHeader,
    /// Decoded payload (claims)
    pub payload: HashMap<String, serde_json::Value>,
    /// Signature segment, still encoded
    pub signature: String,
}

/// JWT header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtHeader {
    /// Algorithm (alg)
    #[serde(default)]
    pub alg: String,
    /// Token type (typ)
    #[serde(default)]
    pub typ: Option<String>,
    /// Other header fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Decoded token plus its lifetime
#[derive(Debug, Clone, Serialize)]
pub struct JwtReport {
    pub token: JwtToken,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub notes: Vec<String>,
}

/// Decode a JWT token
pub fn decode(token: &str) -> Result<JwtToken> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        anyhow::bail!("Invalid JWT structure: expected 3 parts, got {}", parts.len());
    }

    let header_json = decode_segment(parts[0]).context("Failed to decode header")?;
    let header: JwtHeader =
        serde_json::from_slice(&header_json).context("Failed to parse header JSON")?;

    let payload_json = decode_segment(parts[1]).context("Failed to decode payload")?;
    let payload: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&payload_json).context("Failed to parse payload JSON")?;

    Ok(JwtToken {
        header,
        payload,
        signature: parts[2].to_string(),
    })
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))
}

/// Decode and evaluate a token against the current time
pub fn analyze(token: &str) -> Result<JwtReport> {
    analyze_at(token, Utc::now())
}

pub fn analyze_at(token: &str, now: DateTime<Utc>) -> Result<JwtReport> {
    let token = decode(token)?;

    let issued_at = claim_time(&token, "iat");
    let expires_at = claim_time(&token, "exp");
    let expired = expires_at.is_some_and(|exp| exp < now);
    let notes = observations(&token);

    Ok(JwtReport {
        token,
        issued_at,
        expires_at,
        expired,
        notes,
    })
}

/// Numeric date claim as a UTC instant
fn claim_time(token: &JwtToken, claim: &str) -> Option<DateTime<Utc>> {
    let secs = token.payload.get(claim)?.as_f64()?;
    Utc.timestamp_opt(secs as i64, 0).single()
}

fn observations(token: &JwtToken) -> Vec<String> {
    let mut notes = Vec::new();

    match token.header.alg.to_lowercase().as_str() {
        "none" => notes.push("[WARN] Algorithm is 'none': token is not signed".to_string()),
        "" => notes.push("[WARN] No algorithm specified in header".to_string()),
        _ => {}
    }

    if !token.payload.contains_key("exp") {
        notes.push("[WARN] No expiration claim (exp): token never expires".to_string());
    }

    if token.signature.is_empty() {
        notes.push("[WARN] Empty signature segment".to_string());
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(header: &str, payload: &str, signature: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload),
            signature
        )
    }

    #[test]
    fn test_decode_jwt() {
        let raw = token(
            r#"{"alg":"HS256","typ":"JWT"}"#,
            r#"{"sub":"1234567890","name":"John Doe","iat":1516239022}"#,
            "SflKxwRJSMeKKF2QT4fwpMeJf36POk6yJV_adQssw5c",
        );

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.header.alg, "HS256");
        assert_eq!(decoded.payload["name"], "John Doe");
        assert_eq!(decoded.signature, "SflKxwRJSMeKKF2QT4fwpMeJf36POk6yJV_adQssw5c");
    }

    #[test]
    fn test_lifetime_claims() {
        let raw = token(
            r#"{"alg":"HS256"}"#,
            r#"{"iat":1700000000,"exp":1700003600}"#,
            "sig",
        );
        let now = Utc.timestamp_opt(1_700_001_000, 0).unwrap();

        let report = analyze_at(&raw, now).unwrap();
        assert_eq!(report.issued_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(report.expires_at.unwrap().timestamp(), 1_700_003_600);
        assert!(!report.expired);

        let later = Utc.timestamp_opt(1_700_010_000, 0).unwrap();
        assert!(analyze_at(&raw, later).unwrap().expired);
    }

    #[test]
    fn test_unsigned_token_noted() {
        let raw = token(r#"{"alg":"none"}"#, r#"{"sub":"x"}"#, "");
        let report = analyze(&raw).unwrap();
        assert!(!report.expired);
        assert_eq!(report.notes.len(), 3);
    }

    #[test]
    fn test_invalid_structure() {
        assert!(decode("not-a-token").is_err());
        assert!(decode("a.b").is_err());
        assert!(decode("!!!.e30.sig").is_err());
    }
}

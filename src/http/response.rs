//! HTTP response types

use serde::{Deserialize, Serialize};

/// Buffered HTTP response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Final URL after redirects
    pub url: String,

    /// Response headers in wire order, names lowercased
    pub headers: Vec<(String, String)>,

    /// Response body
    pub body: Vec<u8>,

    /// Time until response headers arrived, in milliseconds
    pub duration_ms: u64,
}

impl Response {
    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get body as string
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Body length in characters, matching what a text consumer sees
    pub fn text_len(&self) -> usize {
        self.body_text().chars().count()
    }

    /// Parse body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Get a specific header (case-insensitive). Repeated headers are
    /// joined with ", ".
    pub fn header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }
}

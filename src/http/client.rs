//! HTTP client implementation

use anyhow::{Context, Result};
use reqwest::redirect::{Attempt, Policy};
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use url::Url;

use super::response::Response;
use crate::app::HttpConfig;
use crate::error::ProbeError;
use crate::scanner::CancellationToken;

/// Raised by the redirect policy when a hop leaves the original origin
#[derive(Debug, thiserror::Error)]
#[error("redirect from {from} to {to} leaves the requested origin")]
struct CrossOriginRedirect {
    from: String,
    to: String,
}

/// HTTP client wrapper
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: reqwest::Client,

    /// User agent string
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(redirect_policy(
                config.max_redirects,
                config.allow_cross_origin_redirects,
            ))
            .user_agent(&config.user_agent);

        if let Some(secs) = config.request_timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Issue a GET and buffer the body. The token is raced against both
    /// the request and the body read.
    pub async fn get(&self, url: &str, token: &CancellationToken) -> Result<Response, ProbeError> {
        tracing::debug!(url, "GET");
        let target =
            Url::parse(url).map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", url, e)))?;

        token
            .guard(async {
                let start = Instant::now();
                let response = self.client.get(target).send().await.map_err(classify)?;
                let duration = start.elapsed();

                let status = response.status().as_u16();
                let final_url = response.url().to_string();
                let headers = response
                    .headers()
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_string(),
                            String::from_utf8_lossy(value.as_bytes()).to_string(),
                        )
                    })
                    .collect();

                let body = response.bytes().await.map_err(classify)?;

                tracing::trace!(status, elapsed_ms = duration.as_millis() as u64, "response");

                Ok(Response {
                    status,
                    url: final_url,
                    headers,
                    body: body.to_vec(),
                    duration_ms: duration.as_millis() as u64,
                })
            })
            .await
    }
}

fn redirect_policy(max_redirects: usize, allow_cross_origin: bool) -> Policy {
    Policy::custom(move |attempt: Attempt<'_>| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error("too many redirects");
        }

        if !allow_cross_origin {
            if let Some(first) = attempt.previous().first() {
                if first.origin() != attempt.url().origin() {
                    let err = CrossOriginRedirect {
                        from: first.to_string(),
                        to: attempt.url().to_string(),
                    };
                    return attempt.error(err);
                }
            }
        }

        attempt.follow()
    })
}

/// Map a transport error onto the probe taxonomy
fn classify(err: reqwest::Error) -> ProbeError {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(inner) = source {
        if let Some(redirect) = inner.downcast_ref::<CrossOriginRedirect>() {
            return ProbeError::CrossOrigin(redirect.to_string());
        }
        source = inner.source();
    }

    ProbeError::Network(error_chain(&err))
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

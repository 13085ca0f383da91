//! HTTP client module
//!
//! Cancellation-aware GET client shared by every probe, plus the
//! buffered response type it returns.

mod client;
mod response;

pub use client::HttpClient;
pub use response::Response;

//! Application core module
//!
//! Configuration shared by the CLI and the scan engine.

mod config;

pub use config::{Config, HeuristicConfig, HttpConfig};

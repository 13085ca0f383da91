//! Environment fingerprint
//!
//! Purely observational: records what a remote party could learn about
//! this client and hashes it into a stable identifier.

use sha2::{Digest, Sha256};

use super::ProbeContext;
use crate::error::ProbeError;

/// Observable properties of the running client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub user_agent: String,
    pub os: &'static str,
    pub arch: &'static str,
    /// A graphical display is reachable from this process
    pub display: bool,
    /// Native clients have no WebRTC stack
    pub webrtc: bool,
}

impl Environment {
    pub fn detect(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            display: display_available(),
            webrtc: false,
        }
    }

    /// Hex sha256 over the observed properties
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user_agent.as_bytes());
        hasher.update([0]);
        hasher.update(self.os.as_bytes());
        hasher.update([0]);
        hasher.update(self.arch.as_bytes());
        hasher.update([self.display as u8, self.webrtc as u8]);
        hex::encode(hasher.finalize())
    }
}

fn display_available() -> bool {
    if cfg!(any(target_os = "windows", target_os = "macos")) {
        return true;
    }
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

pub async fn run(ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
    let log = ctx.emitter();
    log.emit("Checking client fingerprinting vectors...");

    let env = Environment::detect(ctx.http.user_agent());
    log.emit(format!("User Agent: {}", env.user_agent));
    log.emit(format!("Platform: {}/{}", env.os, env.arch));

    if env.display {
        log.emit("Graphical display available: true");
    } else {
        log.emit("[WARN] No graphical display detected.");
    }

    log.emit(format!("Environment Fingerprint Hash (sha256): {}", env.hash()));
    log.emit(format!("WebRTC available: {}", env.webrtc));
    log.emit("Note: the user agent can be changed via http.user_agent in the config file.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::Probe;
    use super::*;
    use crate::app::Config;
    use crate::http::HttpClient;
    use crate::scanner::{CancellationToken, LogSink};

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = Environment::detect("probekit/test");
        let b = Environment::detect("probekit/test");
        let c = Environment::detect("probekit/other");

        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert_eq!(a.hash().len(), 64);
        assert!(!a.webrtc);
    }

    #[tokio::test]
    async fn test_logs_full_digest() {
        let config = Config::default();
        let http = HttpClient::new(&config.http).unwrap();
        let token = CancellationToken::new();
        let sink = LogSink::new();
        let ctx = ProbeContext {
            probe: Probe::Fingerprint,
            http: &http,
            config: &config,
            scope: None,
            token: &token,
            sink: &sink,
        };

        run(&ctx).await.unwrap();

        let expected = format!(
            "Environment Fingerprint Hash (sha256): {}",
            Environment::detect(http.user_agent()).hash()
        );
        let messages: Vec<String> = sink.entries().iter().map(|e| e.message().to_string()).collect();
        assert!(messages.contains(&expected));
        assert!(messages.contains(&"WebRTC available: false".to_string()));
    }
}

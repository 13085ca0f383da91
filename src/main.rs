//! probekit - target-scoped security probing toolkit
//!
//! Runs a fixed battery of network and environment probes against one
//! declared target and streams timestamped findings to the terminal.

mod app;
mod error;
mod http;
mod reporting;
mod scanner;
mod scope;
mod spider;

#[cfg(test)]
mod testutil;

pub use error::*;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::{StyledContent, Stylize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::Config;
use crate::reporting::{ReportFormat, ScanReport};
use crate::scanner::{
    CancellationToken, HeaderStatus, LogEntry, LogLevel, LogSink, Probe, ProbeOutcome,
    ScanEngine, SequenceStatus,
};
use crate::scope::TargetScope;

/// Target-scoped security probing toolkit
#[derive(Parser, Debug)]
#[command(name = "probekit")]
#[command(author, version, about = "Target-scoped security probing toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PROBEKIT_CONFIG")]
    config: Option<String>,

    /// Target base URL (http:// or https://)
    #[arg(short = 'u', long, global = true, env = "PROBEKIT_BASE_URL")]
    base_url: Option<String>,

    /// WebSocket endpoint (ws:// or wss://)
    #[arg(short = 'w', long, global = true, env = "PROBEKIT_WS_URL")]
    ws_url: Option<String>,

    /// Query parameter used by the injection probe
    #[arg(short, long, global = true, env = "PROBEKIT_PARAM")]
    param: Option<String>,

    /// Discover the WebSocket endpoint from the base page when none is set
    #[arg(long, global = true)]
    discover_ws: bool,

    /// Write probe findings to this file after the run
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Report format (defaults to the output file extension, then json)
    #[arg(long, global = true, value_enum)]
    format: Option<ReportFormat>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "PROBEKIT_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables file logging)
    #[arg(long, global = true, env = "PROBEKIT_LOG_FILE")]
    log_file: Option<String>,

    /// Enable JSON structured logging
    #[arg(long, global = true, env = "PROBEKIT_LOG_JSON")]
    log_json: bool,

    /// Generate default configuration and exit
    #[arg(long)]
    generate_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate_config: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single probe
    Run {
        #[arg(value_enum)]
        probe: Probe,
    },
    /// Run every probe in sequence (LIVE mode)
    Live,
    /// Look for a WebSocket endpoint referenced by the base page
    Discover,
    /// Inspect the security headers of a URL (defaults to the base URL)
    Headers { url: Option<String> },
    /// Decode a JSON Web Token offline
    Jwt { token: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Install rustls ring crypto provider (required for rustls 0.23+)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    // Handle special commands first
    if cli.generate_config {
        generate_default_config()?;
        return Ok(ExitCode::SUCCESS);
    }

    init_logging(&cli)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting probekit");

    let config = load_config(&cli)?;

    if cli.validate_config {
        println!("Configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command.as_ref() else {
        anyhow::bail!("No command given. Run with --help for usage.");
    };

    if let Command::Jwt { token } = command {
        return print_jwt(token);
    }

    let scope = match build_scope(&config) {
        Ok(scope) => scope,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            eprintln!("{} {}", "hint:".yellow(), e.user_hint());
            return Ok(ExitCode::FAILURE);
        }
    };

    let token = CancellationToken::new();
    tokio::spawn(handle_signals(token.clone()));

    let sink = LogSink::new();
    let printer = spawn_printer(sink.subscribe());
    let engine = ScanEngine::new(&config, sink.clone())?;

    let code = run_command(command, &engine, scope, cli.discover_ws, &token).await;

    if let Some(path) = &cli.output {
        let format = cli
            .format
            .or_else(|| ReportFormat::from_path(path))
            .unwrap_or(ReportFormat::Json);
        let report = ScanReport::from_sink(&sink);
        if report.is_empty() {
            eprintln!("{} no probe findings to export", "note:".yellow());
        }
        report.save(path, format)?;
    }

    // Close the broadcast channel so the printer drains and exits.
    drop(engine);
    drop(sink);
    let _ = printer.await;

    tracing::info!("probekit finished");
    Ok(code)
}

async fn run_command(
    command: &Command,
    engine: &ScanEngine,
    mut scope: Option<TargetScope>,
    discover_ws: bool,
    token: &CancellationToken,
) -> ExitCode {
    let wants_ws = matches!(
        command,
        Command::Live
            | Command::Run {
                probe: Probe::WebSocket
            }
    );
    if discover_ws && wants_ws {
        if let Some(current) = scope.take() {
            scope = Some(discover_into(engine, current, token).await);
        }
    }

    match command {
        Command::Run { probe } => {
            match engine.run_probe(probe, scope.as_ref(), token).await {
                ProbeOutcome::Completed => ExitCode::SUCCESS,
                ProbeOutcome::Aborted | ProbeOutcome::Failed(_) | ProbeOutcome::Refused => {
                    ExitCode::FAILURE
                }
            }
        }
        Command::Live => {
            let report = engine.run_live(scope.as_ref(), token).await;
            if report.status == SequenceStatus::Completed && report.failed().next().is_none() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Discover => {
            let Some(scope) = scope else {
                engine
                    .sink()
                    .system("[WARN] Please set a target scope before running discovery.");
                return ExitCode::FAILURE;
            };
            match engine.discover(scope.base_url(), token).await {
                Some(_) => ExitCode::SUCCESS,
                None => {
                    engine.sink().system(
                        "[ERROR] Automatic discovery failed. Please enter the WebSocket URL manually.",
                    );
                    ExitCode::FAILURE
                }
            }
        }
        Command::Headers { url } => {
            let target = match (url, &scope) {
                (Some(url), _) => url.clone(),
                (None, Some(scope)) => scope.base_url().to_string(),
                (None, None) => {
                    eprintln!("{} no URL given and no base URL configured", "error:".red().bold());
                    return ExitCode::FAILURE;
                }
            };
            match engine.inspect_headers(&target, token).await {
                Ok(report) => {
                    print_headers(&report);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{} {}", "error:".red().bold(), e);
                    eprintln!("{} {}", "hint:".yellow(), e.user_hint());
                    ExitCode::FAILURE
                }
            }
        }
        Command::Jwt { .. } => ExitCode::SUCCESS,
    }
}

/// Fill a missing WebSocket endpoint from discovery when asked to
async fn discover_into(
    engine: &ScanEngine,
    scope: TargetScope,
    token: &CancellationToken,
) -> TargetScope {
    if scope.websocket_url().is_some() {
        return scope;
    }
    let Some(found) = engine.discover(scope.base_url(), token).await else {
        engine
            .sink()
            .system("[ERROR] Automatic discovery failed. Please enter the WebSocket URL manually.");
        return scope;
    };
    match scope.with_websocket_url(found.as_str()) {
        Ok(updated) => updated,
        Err(e) => {
            tracing::warn!(error = %e, "discovered endpoint rejected");
            scope
        }
    }
}

/// Initialize the logging system. Diagnostics go to stderr or a file so
/// stdout carries only findings.
fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if let Some(log_path) = &cli.log_file {
        let path = std::path::Path::new(log_path);
        let file_appender = if path.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("probekit.log");
            RollingFileAppender::new(Rotation::DAILY, dir, filename)
        } else {
            let log_dir = Config::data_dir()
                .map(|d| d.join("logs"))
                .unwrap_or_else(|_| PathBuf::from("."));
            std::fs::create_dir_all(&log_dir).ok();
            RollingFileAppender::new(Rotation::DAILY, log_dir, log_path)
        };

        if cli.log_json {
            let file_layer = fmt::layer()
                .json()
                .with_writer(file_appender)
                .with_ansi(false);
            subscriber.with(file_layer).init();
        } else {
            let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
            subscriber.with(file_layer).init();
        }
    } else if cli.log_json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

/// Load configuration with CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(base_url) = &cli.base_url {
        config.target.base_url = Some(base_url.clone());
    }
    if let Some(ws_url) = &cli.ws_url {
        config.target.websocket_url = Some(ws_url.clone());
    }
    if let Some(param) = &cli.param {
        config.target.injection_parameter = param.clone();
    }
    if let Err(e) = config.validate() {
        eprintln!("{} {}", "hint:".yellow(), e.user_hint());
        return Err(e).context("Invalid configuration");
    }

    Ok(config)
}

/// Scope from the merged config; no base URL means no scope
fn build_scope(config: &Config) -> Result<Option<TargetScope>, ScopeError> {
    let Some(base_url) = config.target.base_url.as_deref() else {
        return Ok(None);
    };
    TargetScope::new(
        base_url,
        config.target.websocket_url.as_deref(),
        &config.target.injection_parameter,
    )
    .map(Some)
}

/// Generate default configuration file
fn generate_default_config() -> Result<()> {
    let config = Config::default();
    let toml = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

    println!("{}", toml);
    Ok(())
}

/// Cancel the active run on Ctrl-C / SIGTERM
async fn handle_signals(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(int), Ok(term)) => (int, term),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "Failed to register signal handlers");
                    return;
                }
            };

        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, cancelling run");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, cancelling run");
            }
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to register Ctrl+C handler");
            return;
        }
        tracing::info!("Received Ctrl+C, cancelling run");
    }

    token.cancel();
}

/// Render sink entries as they arrive
fn spawn_printer(mut rx: broadcast::Receiver<LogEntry>) -> JoinHandle<()> {
    let color = std::io::stdout().is_terminal();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(entry) => println!("{}", render(&entry, color)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "printer fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn render(entry: &LogEntry, color: bool) -> String {
    let prefix = format!(
        "[{}] [{}]",
        entry.timestamp().format("%H:%M:%S"),
        entry.source()
    );
    if !color {
        return format!("{} {}", prefix, entry.message());
    }

    let message: StyledContent<&str> = match entry.level() {
        LogLevel::Error => entry.message().red(),
        LogLevel::Warn => entry.message().yellow(),
        LogLevel::Success => entry.message().green(),
        LogLevel::Info => entry.message().cyan(),
        LogLevel::Plain => entry.message().stylize(),
    };
    format!("{} {}", prefix.dark_grey(), message)
}

fn print_headers(report: &scanner::HeaderReport) {
    println!("{}", "Raw headers".bold());
    for (name, value) in &report.raw_headers {
        println!("  {}: {}", name, value);
    }

    println!();
    println!("{}", "Security headers".bold());
    for finding in &report.analysis {
        let status = match finding.status {
            HeaderStatus::Present => "PRESENT".green(),
            HeaderStatus::Missing => "MISSING".red(),
        };
        println!("  {:<28} {} {}", finding.name, status, finding.value);
        println!("  {:<28} {}", "", finding.description.dark_grey());
    }
}

fn print_jwt(token: &str) -> Result<ExitCode> {
    let report = match scanner::jwt::analyze(token) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("{}", "Header".bold());
    println!("{}", serde_json::to_string_pretty(&report.token.header)?);
    println!("{}", "Payload".bold());
    println!("{}", serde_json::to_string_pretty(&report.token.payload)?);
    println!("{} {}", "Signature:".bold(), report.token.signature);

    if let Some(iat) = report.issued_at {
        println!("{} {}", "Issued at:".bold(), iat.to_rfc3339());
    }
    if let Some(exp) = report.expires_at {
        let status = if report.expired {
            "EXPIRED".red()
        } else {
            "VALID".green()
        };
        println!("{} {} {}", "Expires at:".bold(), exp.to_rfc3339(), status);
    }
    for note in &report.notes {
        println!("{}", note.as_str().yellow());
    }

    Ok(ExitCode::SUCCESS)
}

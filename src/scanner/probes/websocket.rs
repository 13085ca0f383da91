//! WebSocket intercept
//!
//! Opens one connection to the scoped endpoint, sends a test frame and
//! closes after the first reply. The connection lifecycle is an explicit
//! state machine; terminal states end the loop, so exactly one outcome
//! is produced per invocation.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::ProbeContext;
use crate::error::ProbeError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for the peer to acknowledge our close frame
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Connection lifecycle
enum SocketState {
    Connecting,
    Open(WsStream),
    Closing(WsStream),
    Closed,
    Errored(String),
    Aborted,
    TimedOut,
}

impl SocketState {
    fn name(&self) -> &'static str {
        match self {
            SocketState::Connecting => "connecting",
            SocketState::Open(_) => "open",
            SocketState::Closing(_) => "closing",
            SocketState::Closed => "closed",
            SocketState::Errored(_) => "errored",
            SocketState::Aborted => "aborted",
            SocketState::TimedOut => "timed_out",
        }
    }
}

pub async fn run(ctx: &ProbeContext<'_>) -> Result<(), ProbeError> {
    let scope = ctx.scope()?;
    let log = ctx.emitter();

    let Some(url) = scope.websocket_url() else {
        log.emit("[ERROR] WebSocket URL is not set in the target scope.");
        return Ok(());
    };

    ctx.token.check()?;
    log.emit(format!("Attempting to connect to {}...", url));

    let mut state = SocketState::Connecting;
    loop {
        tracing::trace!(state = state.name(), "websocket transition");
        state = match state {
            SocketState::Connecting => connect(url, ctx).await,
            SocketState::Open(ws) => listen(ws, ctx).await,
            SocketState::Closing(ws) => drain(ws, ctx).await,
            SocketState::Closed => {
                log.emit("[INFO] WebSocket connection closed.");
                return Ok(());
            }
            SocketState::Errored(reason) => {
                tracing::warn!(%reason, "websocket error");
                log.emit("[ERROR] WebSocket error occurred.");
                return Err(ProbeError::WebSocket("WebSocket connection failed".to_string()));
            }
            SocketState::Aborted => return Err(ProbeError::Cancelled),
            SocketState::TimedOut => {
                return Err(ProbeError::Timeout(ctx.config.probes.websocket_timeout_secs));
            }
        };
    }
}

/// Connecting: race the handshake against cancellation and the open
/// deadline. Dropping the handshake future tears down the socket.
async fn connect(url: &Url, ctx: &ProbeContext<'_>) -> SocketState {
    let log = ctx.emitter();
    let deadline = tokio::time::sleep(ctx.config.probes.websocket_timeout());

    let connected = tokio::select! {
        biased;
        _ = ctx.token.cancelled() => return SocketState::Aborted,
        _ = deadline => return SocketState::TimedOut,
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };

    let mut ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => return SocketState::Errored(e.to_string()),
    };

    log.emit("[SUCCESS] WebSocket connection established.");
    log.emit("Sending test message...");

    match ws
        .send(Message::Text(ctx.config.probes.websocket_message.clone()))
        .await
    {
        Ok(()) => SocketState::Open(ws),
        Err(e) => SocketState::Errored(e.to_string()),
    }
}

/// Open: wait for the first frame, log it and start closing
async fn listen(mut ws: WsStream, ctx: &ProbeContext<'_>) -> SocketState {
    let log = ctx.emitter();

    loop {
        let frame = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => {
                let _ = tokio::time::timeout(CLOSE_GRACE, ws.close(None)).await;
                return SocketState::Aborted;
            }
            frame = ws.next() => frame,
        };

        let received = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => hex::encode(bytes),
            Some(Ok(Message::Close(_))) | None => return SocketState::Closed,
            Some(Ok(_)) => continue,
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                return SocketState::Closed
            }
            Some(Err(e)) => return SocketState::Errored(e.to_string()),
        };

        log.emit(format!("Received message: {}", received));

        return match ws.close(None).await {
            Ok(()) => SocketState::Closing(ws),
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => SocketState::Closed,
            Err(e) => SocketState::Errored(e.to_string()),
        };
    }
}

/// Closing: drain until the peer acknowledges, or give up after a grace
/// period. Either way the connection is considered closed.
async fn drain(mut ws: WsStream, ctx: &ProbeContext<'_>) -> SocketState {
    let drained = async {
        while let Some(frame) = ws.next().await {
            if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    };

    tokio::select! {
        biased;
        _ = ctx.token.cancelled() => SocketState::Aborted,
        _ = tokio::time::timeout(CLOSE_GRACE, drained) => SocketState::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::super::Probe;
    use super::*;
    use crate::app::Config;
    use crate::http::HttpClient;
    use crate::scanner::{CancellationToken, LogSink};
    use crate::scope::TargetScope;
    use crate::testutil::{serve_silent, serve_ws_echo, serve_ws_mute};
    use std::net::SocketAddr;
    use std::time::Instant;

    struct Harness {
        config: Config,
        http: HttpClient,
        sink: LogSink,
        token: CancellationToken,
    }

    impl Harness {
        fn new(timeout_secs: u64) -> Self {
            let mut config = Config::default();
            config.probes.websocket_timeout_secs = timeout_secs;
            config.probes.websocket_message = "ping".to_string();
            let http = HttpClient::new(&config.http).unwrap();
            Self {
                config,
                http,
                sink: LogSink::new(),
                token: CancellationToken::new(),
            }
        }

        async fn run(&self, scope: &TargetScope) -> Result<(), ProbeError> {
            let ctx = ProbeContext {
                probe: Probe::WebSocket,
                http: &self.http,
                config: &self.config,
                scope: Some(scope),
                token: &self.token,
                sink: &self.sink,
            };
            run(&ctx).await
        }

        fn messages(&self) -> Vec<String> {
            self.sink.entries().iter().map(|e| e.message().to_string()).collect()
        }
    }

    fn scope_for(addr: SocketAddr) -> TargetScope {
        TargetScope::new(
            "http://127.0.0.1/",
            Some(&format!("ws://{}/socket", addr)),
            "q",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_then_close() {
        let addr = serve_ws_echo().await;
        let harness = Harness::new(5);

        harness.run(&scope_for(addr)).await.unwrap();

        let messages = harness.messages();
        assert_eq!(
            messages,
            vec![
                format!("Attempting to connect to ws://{}/socket...", addr),
                "[SUCCESS] WebSocket connection established.".to_string(),
                "Sending test message...".to_string(),
                "Received message: echo: ping".to_string(),
                "[INFO] WebSocket connection closed.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_url_completes_with_error_entry() {
        let harness = Harness::new(5);
        let scope = TargetScope::new("http://127.0.0.1/", None, "q").unwrap();

        harness.run(&scope).await.unwrap();
        assert_eq!(
            harness.messages(),
            vec!["[ERROR] WebSocket URL is not set in the target scope."]
        );
    }

    #[tokio::test]
    async fn test_times_out_no_earlier_than_deadline() {
        let addr = serve_silent().await;
        let harness = Harness::new(1);

        let start = Instant::now();
        let err = harness.run(&scope_for(addr)).await.unwrap_err();

        assert_eq!(err, ProbeError::Timeout(1));
        assert_eq!(err.to_string(), "Connection timed out after 1 seconds.");
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_refused_connection_errors() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let harness = Harness::new(5);

        let err = harness.run(&scope_for(addr)).await.unwrap_err();

        assert!(matches!(err, ProbeError::WebSocket(_)));
        assert_eq!(
            harness.messages().last().map(String::as_str),
            Some("[ERROR] WebSocket error occurred.")
        );
    }

    #[tokio::test]
    async fn test_cancel_while_connecting_is_silent() {
        let addr = serve_silent().await;
        let harness = Harness::new(30);
        let canceller = harness.token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let err = harness.run(&scope_for(addr)).await.unwrap_err();

        assert_eq!(err, ProbeError::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(harness.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_open_closes_socket() {
        let (addr, mut peer_closed) = serve_ws_mute().await;
        let harness = Harness::new(30);

        let mut rx = harness.sink.subscribe();
        let canceller = harness.token.clone();
        tokio::spawn(async move {
            while let Ok(entry) = rx.recv().await {
                if entry.message() == "[SUCCESS] WebSocket connection established." {
                    canceller.cancel();
                    break;
                }
            }
        });

        let start = Instant::now();
        let err = harness.run(&scope_for(addr)).await.unwrap_err();

        assert_eq!(err, ProbeError::Cancelled);
        assert!(start.elapsed() < CLOSE_GRACE + Duration::from_secs(1));
        assert!(!harness
            .messages()
            .iter()
            .any(|m| m == "[INFO] WebSocket connection closed."));

        let closed = tokio::time::timeout(Duration::from_secs(2), peer_closed.recv()).await;
        assert_eq!(closed.unwrap(), Some(()));
    }
}

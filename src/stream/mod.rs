//! Shared plumbing for streaming speech sessions.
//!
//! Both session kinds (synthesis and transcription) are built from the same
//! parts: an authenticated WebSocket connection, a single background
//! dispatcher task that owns the read half, a one-shot readiness gate, a
//! write-once error register, and bounded result channels the dispatcher
//! publishes into without ever blocking.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   x-api-key    ┌──────────────────┐
//! │  connect()   │───────────────▶│  WebSocket       │
//! └──────────────┘                │  (split)         │
//!                                 └───┬──────────┬───┘
//!                         write half  │          │  read half
//!                  ┌──────────────────▼──┐   ┌───▼─────────────┐
//!                  │ Mutex<sink>         │   │ Dispatcher task │
//!                  │ send_text/send_audio│   │ decode + route  │
//!                  └─────────────────────┘   └───┬──────┬──────┘
//!                                                │      │
//!                                     ReadyGate ◀┘      └▶ bounded mpsc
//!                                     ErrorRegister        (drop-on-full)
//! ```

use std::sync::OnceLock;

use futures_util::stream::{SplitSink, SplitStream};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::warn;

use crate::error::{Error, Result};

pub(crate) mod messages;

/// Capacity of the synthesized-audio channel.
pub(crate) const AUDIO_CHANNEL_CAPACITY: usize = 100;
/// Capacity of the transcript-segment channel.
pub(crate) const TEXT_CHANNEL_CAPACITY: usize = 100;
/// Capacity of the step-report channel.
pub(crate) const STEP_CHANNEL_CAPACITY: usize = 100;
/// Capacity of the end-of-segment marker channel.
pub(crate) const END_TEXT_CHANNEL_CAPACITY: usize = 10;
/// Capacity of the unified event channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 100;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;

/// Open the duplex connection for one session.
///
/// `ws_url` is the client's speech endpoint; `subpath` selects the capability
/// (`/tts` or `/stt`). Authentication travels in the `x-api-key` header of
/// the upgrade request.
pub(crate) async fn connect(ws_url: &str, subpath: &str, api_key: &str) -> Result<WsStream> {
    let url = format!("{ws_url}{subpath}");

    let mut request = url
        .into_client_request()
        .map_err(|e| Error::Connection(format!("invalid WebSocket URL: {e}")))?;
    let key = HeaderValue::from_str(api_key)
        .map_err(|_| Error::Connection("API key contains invalid header characters".to_string()))?;
    request.headers_mut().insert("x-api-key", key);

    let (ws_stream, _response) = connect_async(request)
        .await
        .map_err(|e| Error::Connection(format!("failed to connect to {subpath} WebSocket: {e}")))?;

    Ok(ws_stream)
}

/// Serialize one outbound frame and write it through the shared sink.
///
/// The sink mutex is the serialization point for concurrent senders; a frame
/// is always written whole.
pub(crate) async fn send_json<T: Serialize>(sink: &Mutex<WsSink>, message: &T) -> Result<()> {
    use futures_util::SinkExt;

    let text = serde_json::to_string(message).map_err(|e| Error::WebSocket {
        message: format!("failed to encode message: {e}"),
        code: None,
    })?;

    sink.lock()
        .await
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| Error::WebSocket {
            message: format!("failed to send message: {e}"),
            code: None,
        })
}

/// Non-blocking publish into a bounded result channel.
///
/// Lossy by design: when the consumer falls behind, the newest item for that
/// category is dropped so the dispatcher never stalls behind a slow reader.
pub(crate) fn offer<T>(tx: &mpsc::Sender<T>, item: T, category: &'static str) {
    match tx.try_send(item) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("{category} channel full, dropping item");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

// =============================================================================
// Readiness Gate
// =============================================================================

/// Single-resolution handshake signal.
///
/// Resolves exactly once, to either ready info or the session's terminal
/// error; later resolutions are no-ops. Any number of waiters observe the
/// same latched outcome, and waiting never affects the gate itself.
pub(crate) struct ReadyGate<T> {
    tx: watch::Sender<Option<Result<T>>>,
}

impl<T: Clone> ReadyGate<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Record the outcome if nothing has been recorded yet.
    pub fn resolve(&self, outcome: Result<T>) {
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(outcome);
                true
            } else {
                false
            }
        });
    }

    /// Whether an outcome has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Outcome if already recorded, without waiting.
    pub fn peek(&self) -> Option<Result<T>> {
        self.tx.borrow().clone()
    }

    /// Wait until the gate resolves and return the latched outcome.
    pub async fn wait(&self) -> Result<T> {
        let mut rx = self.tx.subscribe();
        let resolved = rx.wait_for(|slot| slot.is_some()).await.map_err(|_| {
            Error::WebSocket {
                message: "stream closed before ready".to_string(),
                code: None,
            }
        })?;
        resolved.clone().unwrap_or_else(|| {
            Err(Error::WebSocket {
                message: "stream closed before ready".to_string(),
                code: None,
            })
        })
    }
}

// =============================================================================
// Error Register
// =============================================================================

/// Write-once-wins holder for the first fatal condition a session observes.
#[derive(Default)]
pub(crate) struct ErrorRegister {
    slot: OnceLock<Error>,
}

impl ErrorRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` unless an earlier error is already held.
    pub fn record(&self, err: Error) {
        let _ = self.slot.set(err);
    }

    /// The first recorded error, if any.
    pub fn get(&self) -> Option<Error> {
        self.slot.get().cloned()
    }
}

//! In-process WebSocket server used by the streaming test suites.
//!
//! Each test spins up a listener on an ephemeral port, accepts exactly one
//! connection and runs a scripted handler against it. The returned base URL
//! plugs straight into `ClientBuilder::base_url`, so the client derives
//! `ws://127.0.0.1:<port>/speech` and connects to `/speech/tts` or
//! `/speech/stt` exactly as it would against the real endpoint.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::Message;

pub type ServerWs = WebSocketStream<TcpStream>;

/// Upgrade request details captured during the handshake.
#[derive(Debug, Clone, Default)]
pub struct RecordedUpgrade {
    pub path: String,
    pub api_key: Option<String>,
}

/// Start a one-connection server running `handler` against the accepted
/// WebSocket. Returns the HTTP base URL and the recorded upgrade request.
pub async fn spawn_ws_server<F, Fut>(handler: F) -> (String, Arc<Mutex<RecordedUpgrade>>)
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(RecordedUpgrade::default()));

    let recorded_in_task = recorded.clone();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };

        let callback = |request: &Request, response: Response| {
            let mut slot = recorded_in_task.lock().unwrap();
            slot.path = request.uri().path().to_string();
            slot.api_key = request
                .headers()
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            Ok(response)
        };

        if let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await {
            handler(ws).await;
        }
    });

    (format!("http://{addr}"), recorded)
}

/// Send one JSON frame to the client.
pub async fn send_json(ws: &mut ServerWs, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Send a raw (not necessarily valid) text frame to the client.
pub async fn send_raw(ws: &mut ServerWs, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

/// Read the next text frame from the client and parse it as JSON.
pub async fn recv_json(ws: &mut ServerWs) -> serde_json::Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).unwrap();
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

//! Streaming synthesis session: handle and dispatcher.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::stream::messages::{
    EndOfStreamMessage, ServerMessage, TextMessage, TtsSetupMessage,
};
use crate::stream::{
    AUDIO_CHANNEL_CAPACITY, ErrorRegister, ReadyGate, WsSink, WsSource, WsStream, offer, send_json,
};
use crate::types::TtsResult;

/// Sample rate of synthesized audio.
const OUTPUT_SAMPLE_RATE: u32 = 48000;

/// Handle for one streaming synthesis session.
///
/// The session is driven by a background dispatcher that owns the read half
/// of the connection. The handle exposes the write side, the readiness gate,
/// the bounded audio channel, a completion signal and idempotent teardown.
pub struct TtsStream {
    /// Write half, shared with the dispatcher's teardown path. The mutex
    /// serializes concurrent sends so frames are never interleaved.
    sink: Arc<Mutex<WsSink>>,

    /// Readiness gate holding the request id once the handshake completes.
    gate: Arc<ReadyGate<String>>,

    /// First fatal condition observed by the dispatcher.
    register: Arc<ErrorRegister>,

    /// Synthesized audio chunks, closed by the dispatcher on termination.
    audio_rx: mpsc::Receiver<Bytes>,

    /// Completion signal, flipped after every channel has been closed.
    done_rx: watch::Receiver<bool>,

    /// Teardown trigger, consumed by the first `close()`.
    shutdown_tx: std::sync::Mutex<Option<oneshot::Sender<()>>>,
}

impl TtsStream {
    /// Send the setup frame and start the dispatcher.
    ///
    /// Releases the connection before returning if the setup send fails.
    pub(crate) async fn open(ws: WsStream, setup: &TtsSetupMessage) -> Result<Self> {
        let (sink, source) = ws.split();
        let sink = Arc::new(Mutex::new(sink));

        if let Err(e) = send_json(&sink, setup).await {
            let _ = sink.lock().await.close().await;
            return Err(e);
        }

        let gate = Arc::new(ReadyGate::new());
        let register = Arc::new(ErrorRegister::new());
        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_CHANNEL_CAPACITY);
        let (done_tx, done_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(run_dispatcher(
            source,
            sink.clone(),
            gate.clone(),
            register.clone(),
            audio_tx,
            done_tx,
            shutdown_rx,
        ));

        Ok(Self {
            sink,
            gate,
            register,
            audio_rx,
            done_rx,
            shutdown_tx: std::sync::Mutex::new(Some(shutdown_tx)),
        })
    }

    /// Wait for the handshake to complete.
    ///
    /// Resolves exactly once per session; repeated calls observe the same
    /// outcome. A handshake rejected by the server surfaces here as
    /// [`Error::WebSocket`] with the server's message and code.
    pub async fn wait_ready(&self) -> Result<()> {
        self.gate.wait().await.map(|_| ())
    }

    /// [`wait_ready`](Self::wait_ready) bounded by a caller deadline.
    ///
    /// An elapsed deadline returns [`Error::Timeout`] and leaves the session
    /// running; a later call can still observe the handshake outcome.
    pub async fn wait_ready_timeout(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.wait_ready())
            .await
            .map_err(|_| Error::Timeout("waiting for stream ready".to_string()))?
    }

    /// Request id assigned by the server, once ready.
    pub fn request_id(&self) -> Option<String> {
        match self.gate.peek() {
            Some(Ok(request_id)) => Some(request_id),
            _ => None,
        }
    }

    /// Send one text chunk to synthesize.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        send_json(&self.sink, &TextMessage::new(text)).await
    }

    /// Signal the end of text input.
    pub async fn send_end_of_stream(&self) -> Result<()> {
        send_json(&self.sink, &EndOfStreamMessage::default()).await
    }

    /// Receiver of synthesized audio chunks, in arrival order.
    ///
    /// The channel is bounded and lossy under backpressure; it yields a
    /// finite sequence terminated by channel closure when the session ends.
    pub fn audio(&mut self) -> &mut mpsc::Receiver<Bytes> {
        &mut self.audio_rx
    }

    /// Drain the audio channel until closure and concatenate the chunks.
    ///
    /// If the session recorded a fatal error, that error is returned instead
    /// of the (possibly partial) audio.
    pub async fn collect(&mut self) -> Result<TtsResult> {
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut total_len = 0;

        while let Some(chunk) = self.audio_rx.recv().await {
            total_len += chunk.len();
            chunks.push(chunk);
        }

        if let Some(err) = self.register.get() {
            return Err(err);
        }

        let mut raw_data = BytesMut::with_capacity(total_len);
        for chunk in &chunks {
            raw_data.extend_from_slice(chunk);
        }

        Ok(TtsResult {
            raw_data: raw_data.freeze(),
            sample_rate: OUTPUT_SAMPLE_RATE,
            request_id: self.request_id().unwrap_or_default(),
        })
    }

    /// [`collect`](Self::collect) bounded by a caller deadline.
    pub async fn collect_timeout(&mut self, timeout: Duration) -> Result<TtsResult> {
        tokio::time::timeout(timeout, self.collect())
            .await
            .map_err(|_| Error::Timeout("collecting audio".to_string()))?
    }

    /// Wait until the session has fully terminated and all channels closed.
    pub async fn done(&self) {
        let mut rx = self.done_rx.clone();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Tear the session down.
    ///
    /// Idempotent: the first call triggers the dispatcher to close the
    /// connection; later calls (and calls after the session already
    /// terminated on its own) succeed without effect.
    pub fn close(&self) -> Result<()> {
        if let Ok(mut slot) = self.shutdown_tx.lock()
            && let Some(tx) = slot.take()
        {
            let _ = tx.send(());
        }
        Ok(())
    }
}

impl Drop for TtsStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Background read loop: decodes every inbound frame and publishes results
/// until a terminal condition, then closes the audio channel exactly once
/// and fires the completion signal.
async fn run_dispatcher(
    mut source: WsSource,
    sink: Arc<Mutex<WsSink>>,
    gate: Arc<ReadyGate<String>>,
    register: Arc<ErrorRegister>,
    audio_tx: mpsc::Sender<Bytes>,
    done_tx: watch::Sender<bool>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            message = source.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let msg = match ServerMessage::parse(text.as_str()) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!("discarding malformed frame: {e}");
                                continue;
                            }
                        };

                        match msg {
                            ServerMessage::Ready(ready) => {
                                debug!("synthesis session ready: {}", ready.request_id);
                                gate.resolve(Ok(ready.request_id));
                            }
                            ServerMessage::Audio(audio) => {
                                match BASE64.decode(audio.audio.as_bytes()) {
                                    Ok(decoded) => {
                                        offer(&audio_tx, Bytes::from(decoded), "audio");
                                    }
                                    Err(e) => {
                                        warn!("discarding audio frame with invalid base64: {e}");
                                    }
                                }
                            }
                            ServerMessage::EndOfStream => {
                                debug!("synthesis stream ended");
                                break;
                            }
                            ServerMessage::Error(err) => {
                                let error = Error::WebSocket {
                                    message: err.message,
                                    code: err.code,
                                };
                                register.record(error.clone());
                                gate.resolve(Err(error));
                                break;
                            }
                            ServerMessage::Unknown(kind) => {
                                debug!("ignoring unknown message type: {kind}");
                            }
                            // Transcript categories never appear on the
                            // synthesis stream.
                            _ => debug!("ignoring message not applicable to synthesis"),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let error = Error::WebSocket {
                            message: match frame {
                                Some(frame) => format!("connection closed: {}", frame.reason),
                                None => "connection closed".to_string(),
                            },
                            code: None,
                        };
                        register.record(error.clone());
                        gate.resolve(Err(error));
                        break;
                    }
                    // Ping/pong and unexpected binary frames are ignored.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let error = Error::WebSocket {
                            message: format!("read error: {e}"),
                            code: None,
                        };
                        register.record(error.clone());
                        gate.resolve(Err(error));
                        break;
                    }
                    None => {
                        let error = Error::WebSocket {
                            message: "connection closed".to_string(),
                            code: None,
                        };
                        register.record(error.clone());
                        gate.resolve(Err(error));
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                info!("closing synthesis stream");
                let _ = sink.lock().await.close().await;
                let error = Error::WebSocket {
                    message: "stream closed".to_string(),
                    code: None,
                };
                register.record(error.clone());
                gate.resolve(Err(error));
                break;
            }
        }
    }

    // A session that terminated before ready still resolves the gate, with
    // the registered error when one exists.
    gate.resolve(Err(register.get().unwrap_or_else(|| Error::WebSocket {
        message: "stream closed before ready".to_string(),
        code: None,
    })));

    drop(audio_tx);
    let _ = done_tx.send(true);
}

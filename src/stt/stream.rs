//! Streaming transcription session: handle and dispatcher.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::stream::messages::{
    AudioMessage, EndOfStreamMessage, ServerMessage, SttSetupMessage,
};
use crate::stream::{
    END_TEXT_CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY, ErrorRegister, ReadyGate,
    STEP_CHANNEL_CAPACITY, TEXT_CHANNEL_CAPACITY, WsSink, WsSource, WsStream, offer, send_json,
};
use crate::types::{SttEndTextResult, SttEvent, SttReadyInfo, SttStepResult, SttTextResult};

/// Handle for one streaming transcription session.
///
/// Structured results fan out into per-category bounded channels (transcript
/// segments, step reports, end-of-segment markers) and are mirrored into a
/// unified event feed that preserves wire arrival order across categories.
pub struct SttStream {
    /// Write half, shared with the dispatcher's teardown path.
    sink: Arc<Mutex<WsSink>>,

    /// Readiness gate holding the handshake info.
    gate: Arc<ReadyGate<SttReadyInfo>>,

    /// First fatal condition observed by the dispatcher.
    register: Arc<ErrorRegister>,

    text_rx: mpsc::Receiver<SttTextResult>,
    step_rx: mpsc::Receiver<SttStepResult>,
    end_text_rx: mpsc::Receiver<SttEndTextResult>,
    event_rx: mpsc::Receiver<SttEvent>,

    /// Completion signal, flipped after every channel has been closed.
    done_rx: watch::Receiver<bool>,

    /// Teardown trigger, consumed by the first `close()`.
    shutdown_tx: std::sync::Mutex<Option<oneshot::Sender<()>>>,
}

impl SttStream {
    /// Send the setup frame and start the dispatcher.
    ///
    /// Releases the connection before returning if the setup send fails.
    pub(crate) async fn open(ws: WsStream, setup: &SttSetupMessage) -> Result<Self> {
        let (sink, source) = ws.split();
        let sink = Arc::new(Mutex::new(sink));

        if let Err(e) = send_json(&sink, setup).await {
            let _ = sink.lock().await.close().await;
            return Err(e);
        }

        let gate = Arc::new(ReadyGate::new());
        let register = Arc::new(ErrorRegister::new());
        let (text_tx, text_rx) = mpsc::channel(TEXT_CHANNEL_CAPACITY);
        let (step_tx, step_rx) = mpsc::channel(STEP_CHANNEL_CAPACITY);
        let (end_text_tx, end_text_rx) = mpsc::channel(END_TEXT_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (done_tx, done_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(run_dispatcher(DispatcherContext {
            source,
            sink: sink.clone(),
            gate: gate.clone(),
            register: register.clone(),
            text_tx,
            step_tx,
            end_text_tx,
            event_tx,
            done_tx,
            shutdown_rx,
        }));

        Ok(Self {
            sink,
            gate,
            register,
            text_rx,
            step_rx,
            end_text_rx,
            event_rx,
            done_rx,
            shutdown_tx: std::sync::Mutex::new(Some(shutdown_tx)),
        })
    }

    /// Wait for the handshake to complete and return the session info.
    ///
    /// Resolves exactly once per session; repeated calls observe the same
    /// outcome.
    pub async fn wait_ready(&self) -> Result<SttReadyInfo> {
        self.gate.wait().await
    }

    /// [`wait_ready`](Self::wait_ready) bounded by a caller deadline.
    ///
    /// An elapsed deadline returns [`Error::Timeout`] and leaves the session
    /// running.
    pub async fn wait_ready_timeout(&self, timeout: Duration) -> Result<SttReadyInfo> {
        tokio::time::timeout(timeout, self.wait_ready())
            .await
            .map_err(|_| Error::Timeout("waiting for stream ready".to_string()))?
    }

    /// Handshake info if the session is ready, without waiting.
    pub fn ready_info(&self) -> Option<SttReadyInfo> {
        match self.gate.peek() {
            Some(Ok(info)) => Some(info),
            _ => None,
        }
    }

    /// Send one chunk of audio to transcribe.
    ///
    /// The payload travels base64-encoded. Audio should match the format
    /// negotiated at setup (PCM is 24 kHz 16-bit mono).
    pub async fn send_audio(&self, audio: &[u8]) -> Result<()> {
        let encoded = BASE64.encode(audio);
        send_json(&self.sink, &AudioMessage::new(encoded)).await
    }

    /// Signal the end of audio input.
    pub async fn send_end_of_stream(&self) -> Result<()> {
        send_json(&self.sink, &EndOfStreamMessage::default()).await
    }

    /// Receiver of transcript segments, in arrival order.
    pub fn text(&mut self) -> &mut mpsc::Receiver<SttTextResult> {
        &mut self.text_rx
    }

    /// Receiver of step reports with voice-activity predictions.
    pub fn vad(&mut self) -> &mut mpsc::Receiver<SttStepResult> {
        &mut self.step_rx
    }

    /// Receiver of end-of-segment markers.
    pub fn end_text(&mut self) -> &mut mpsc::Receiver<SttEndTextResult> {
        &mut self.end_text_rx
    }

    /// Unified receiver of all structured categories in wire arrival order.
    pub fn events(&mut self) -> &mut mpsc::Receiver<SttEvent> {
        &mut self.event_rx
    }

    /// Drain the transcript channel until closure and join the segments
    /// with single spaces.
    ///
    /// If the session recorded a fatal error, that error is returned instead
    /// of the (possibly partial) transcript.
    pub async fn collect_text(&mut self) -> Result<String> {
        let mut texts: Vec<String> = Vec::new();

        while let Some(segment) = self.text_rx.recv().await {
            texts.push(segment.text);
        }

        if let Some(err) = self.register.get() {
            return Err(err);
        }

        Ok(texts.join(" "))
    }

    /// [`collect_text`](Self::collect_text) bounded by a caller deadline.
    pub async fn collect_text_timeout(&mut self, timeout: Duration) -> Result<String> {
        tokio::time::timeout(timeout, self.collect_text())
            .await
            .map_err(|_| Error::Timeout("collecting transcript".to_string()))?
    }

    /// Wait until the session has fully terminated and all channels closed.
    pub async fn done(&self) {
        let mut rx = self.done_rx.clone();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Tear the session down. Idempotent; see [`TtsStream::close`].
    ///
    /// [`TtsStream::close`]: crate::tts::TtsStream::close
    pub fn close(&self) -> Result<()> {
        if let Ok(mut slot) = self.shutdown_tx.lock()
            && let Some(tx) = slot.take()
        {
            let _ = tx.send(());
        }
        Ok(())
    }
}

impl Drop for SttStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct DispatcherContext {
    source: WsSource,
    sink: Arc<Mutex<WsSink>>,
    gate: Arc<ReadyGate<SttReadyInfo>>,
    register: Arc<ErrorRegister>,
    text_tx: mpsc::Sender<SttTextResult>,
    step_tx: mpsc::Sender<SttStepResult>,
    end_text_tx: mpsc::Sender<SttEndTextResult>,
    event_tx: mpsc::Sender<SttEvent>,
    done_tx: watch::Sender<bool>,
    shutdown_rx: oneshot::Receiver<()>,
}

/// Background read loop: decodes every inbound frame, publishes structured
/// results into the category channel and the unified feed, and closes every
/// channel exactly once at termination.
async fn run_dispatcher(ctx: DispatcherContext) {
    let DispatcherContext {
        mut source,
        sink,
        gate,
        register,
        text_tx,
        step_tx,
        end_text_tx,
        event_tx,
        done_tx,
        mut shutdown_rx,
    } = ctx;

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
                                let info: SttReadyInfo = ready.into();
                                debug!("transcription session ready: {}", info.request_id);
                                gate.resolve(Ok(info));
                            }
                            ServerMessage::Text(segment) => {
                                offer(&text_tx, segment.clone(), "text");
                                offer(&event_tx, SttEvent::Text(segment), "event");
                            }
                            ServerMessage::Step(step) => {
                                offer(&step_tx, step.clone(), "step");
                                offer(&event_tx, SttEvent::Step(step), "event");
                            }
                            ServerMessage::EndText(marker) => {
                                offer(&end_text_tx, marker.clone(), "end_text");
                                offer(&event_tx, SttEvent::EndText(marker), "event");
                            }
                            ServerMessage::EndOfStream => {
                                debug!("transcription stream ended");
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
                            // Synthesized audio never appears on the
                            // transcription stream.
                            ServerMessage::Audio(_) => {
                                debug!("ignoring audio frame on transcription stream");
                            }
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
                info!("closing transcription stream");
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

    drop(text_tx);
    drop(step_tx);
    drop(end_text_tx);
    drop(event_tx);
    let _ = done_tx.send(true);
}

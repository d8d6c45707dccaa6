//! Speech-to-text over a streaming session.
//!
//! [`SttService::stream`] opens the session and hands back a [`SttStream`]
//! with per-category result channels plus a unified event feed;
//! [`SttService::transcribe`] is the one-shot path for complete audio.

mod stream;

pub use stream::SttStream;

use crate::client::Client;
use crate::error::Result;
use crate::stream::messages::SttSetupMessage;
use crate::types::{DEFAULT_MODEL_NAME, SttParams};

/// Size of one outbound audio chunk used by `transcribe`:
/// 1920 samples at 16-bit mono, 80 ms at 24 kHz.
const TRANSCRIBE_CHUNK_SIZE: usize = 1920 * 2;

/// Speech-to-text operations.
pub struct SttService<'a> {
    client: &'a Client,
}

impl<'a> SttService<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Open a streaming transcription session.
    ///
    /// Connects to the `/stt` endpoint, sends the setup frame and starts the
    /// background dispatcher. The connection is released before returning if
    /// either step fails.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut stream = client.stt().stream(SttParams {
    ///     input_format: InputFormat::Pcm,
    ///     ..Default::default()
    /// }).await?;
    ///
    /// let info = stream.wait_ready().await?;
    /// println!("Sample rate: {}", info.sample_rate);
    ///
    /// stream.send_audio(&audio_chunk).await?;
    /// stream.send_end_of_stream().await?;
    ///
    /// while let Some(segment) = stream.text().recv().await {
    ///     println!("Transcription: {}", segment.text);
    /// }
    /// stream.close()?;
    /// ```
    pub async fn stream(&self, params: SttParams) -> Result<SttStream> {
        let model_name = if params.model_name.is_empty() {
            DEFAULT_MODEL_NAME.to_string()
        } else {
            params.model_name
        };

        let setup = SttSetupMessage {
            message_type: "setup",
            input_format: params.input_format,
            model_name,
        };

        let ws = crate::stream::connect(self.client.ws_url(), "/stt", self.client.api_key()).await?;

        SttStream::open(ws, &setup).await
    }

    /// Transcribe complete audio data.
    ///
    /// Audio is sent in 80 ms chunks (PCM 24 kHz 16-bit mono framing),
    /// followed by the end-of-stream sentinel; segments are joined with
    /// single spaces.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let audio = std::fs::read("audio.wav")?;
    /// let text = client
    ///     .stt()
    ///     .transcribe(SttParams { input_format: InputFormat::Wav, ..Default::default() }, &audio)
    ///     .await?;
    /// ```
    pub async fn transcribe(&self, params: SttParams, audio: &[u8]) -> Result<String> {
        let mut stream = self.stream(params).await?;

        let result = async {
            stream.wait_ready().await?;

            for chunk in audio.chunks(TRANSCRIBE_CHUNK_SIZE) {
                stream.send_audio(chunk).await?;
            }

            stream.send_end_of_stream().await?;
            stream.collect_text().await
        }
        .await;

        let _ = stream.close();
        result
    }
}

//! Text-to-speech over a streaming session.
//!
//! [`TtsService::stream`] opens the session and hands back a [`TtsStream`]
//! for manual control; [`TtsService::create`] is the one-shot path that
//! performs the whole exchange and returns the assembled audio.

mod stream;

pub use stream::TtsStream;

use crate::client::Client;
use crate::error::Result;
use crate::stream::messages::TtsSetupMessage;
use crate::types::{DEFAULT_MODEL_NAME, TtsParams, TtsResult};

/// Text-to-speech operations.
pub struct TtsService<'a> {
    client: &'a Client,
}

impl<'a> TtsService<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Convert text to speech and return the complete audio.
    ///
    /// One-shot wrapper around [`stream`](Self::stream): handshake, send the
    /// text, signal end of input, and collect every audio chunk.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let result = client
    ///     .tts()
    ///     .create(TtsParams {
    ///         voice_id: "YTpq7expH9539ERJ".to_string(),
    ///         output_format: OutputFormat::Wav,
    ///         text: "Hello, world!".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .await?;
    /// std::fs::write("output.wav", &result.raw_data)?;
    /// ```
    pub async fn create(&self, params: TtsParams) -> Result<TtsResult> {
        let text = params.text.clone();
        let mut stream = self.stream(params).await?;

        let result = async {
            stream.wait_ready().await?;
            stream.send_text(&text).await?;
            stream.send_end_of_stream().await?;
            stream.collect().await
        }
        .await;

        let _ = stream.close();
        result
    }

    /// Open a streaming synthesis session.
    ///
    /// Connects to the `/tts` endpoint, sends the setup frame and starts the
    /// background dispatcher. The connection is released before returning if
    /// either step fails.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut stream = client.tts().stream(TtsParams {
    ///     voice_id: "YTpq7expH9539ERJ".to_string(),
    ///     output_format: OutputFormat::Pcm,
    ///     ..Default::default()
    /// }).await?;
    ///
    /// stream.wait_ready().await?;
    /// stream.send_text("Hello, world!").await?;
    /// stream.send_end_of_stream().await?;
    ///
    /// while let Some(chunk) = stream.audio().recv().await {
    ///     // Process audio chunk
    /// }
    /// stream.close()?;
    /// ```
    pub async fn stream(&self, params: TtsParams) -> Result<TtsStream> {
        let model_name = if params.model_name.is_empty() {
            DEFAULT_MODEL_NAME.to_string()
        } else {
            params.model_name
        };

        let setup = TtsSetupMessage {
            message_type: "setup",
            voice_id: params.voice_id,
            output_format: params.output_format,
            model_name,
            json_config: params
                .json_config
                .as_ref()
                .and_then(|config| serde_json::to_value(config).ok()),
        };

        let ws = crate::stream::connect(self.client.ws_url(), "/tts", self.client.api_key()).await?;

        TtsStream::open(ws, &setup).await
    }
}

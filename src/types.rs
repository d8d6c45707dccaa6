//! Public data types: audio formats, request parameters, and the results
//! delivered by REST calls and streaming sessions.
//!
//! Serde names follow the wire format of the Gradium API; fields the server
//! may omit are `Option` with `#[serde(default)]`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Model name used when a request does not specify one.
pub const DEFAULT_MODEL_NAME: &str = "default";

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio output formats for speech synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Wav,
    Pcm,
    Opus,
    #[serde(rename = "ulaw_8000")]
    Ulaw8000,
    #[serde(rename = "alaw_8000")]
    Alaw8000,
    #[serde(rename = "pcm_16000")]
    Pcm16000,
    #[serde(rename = "pcm_24000")]
    Pcm24000,
}

impl OutputFormat {
    /// Wire representation of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Pcm => "pcm",
            OutputFormat::Opus => "opus",
            OutputFormat::Ulaw8000 => "ulaw_8000",
            OutputFormat::Alaw8000 => "alaw_8000",
            OutputFormat::Pcm16000 => "pcm_16000",
            OutputFormat::Pcm24000 => "pcm_24000",
        }
    }
}

/// Audio input formats for transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    #[default]
    Pcm,
    Wav,
    Opus,
}

impl InputFormat {
    /// Wire representation of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Pcm => "pcm",
            InputFormat::Wav => "wav",
            InputFormat::Opus => "opus",
        }
    }
}

// =============================================================================
// Voices
// =============================================================================

/// A voice profile usable for synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub uid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub start_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_s: Option<f64>,
    pub filename: String,
}

/// Parameters for creating a custom voice from an audio sample.
#[derive(Debug, Clone, Default)]
pub struct VoiceCreateParams {
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    /// Offset into the sample where the voice reference starts, in seconds.
    pub start_s: f64,
    pub timeout_s: f64,
    /// Format of the uploaded sample, e.g. "wav". Empty means server default.
    pub input_format: String,
}

/// Response from voice creation.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceCreateResponse {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub was_updated: bool,
}

/// Parameters for updating an existing voice. `None` fields are left as-is.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VoiceUpdateParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_s: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
}

/// Pagination and filtering for voice listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceListParams {
    pub skip: usize,
    pub limit: usize,
    pub include_catalog: bool,
}

// =============================================================================
// Credits
// =============================================================================

/// Credit balance information for the authenticated organization.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditsSummary {
    pub remaining_credits: i64,
    pub allocated_credits: i64,
    pub billing_period: String,
    #[serde(default)]
    pub next_rollover_date: Option<String>,
    pub plan_name: String,
}

// =============================================================================
// TTS
// =============================================================================

/// Parameters for a synthesis session.
#[derive(Debug, Clone, Default)]
pub struct TtsParams {
    /// Voice profile to synthesize with.
    pub voice_id: String,
    pub output_format: OutputFormat,
    /// Model name; empty resolves to [`DEFAULT_MODEL_NAME`] at session open.
    pub model_name: String,
    /// Text to synthesize. Used by `create`; not part of the setup frame.
    pub text: String,
    /// Advanced configuration, forwarded verbatim inside the setup frame.
    pub json_config: Option<TtsConfig>,
}

/// Advanced synthesis configuration.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TtsConfig {
    /// Speed control: negative is faster (-4.0 to -0.1), positive slower
    /// (0.1 to 4.0).
    pub padding_bonus: f64,
}

/// Complete audio produced by a synthesis session.
#[derive(Debug, Clone)]
pub struct TtsResult {
    /// Concatenated audio chunks in arrival order.
    pub raw_data: Bytes,
    /// Sample rate of the returned audio.
    pub sample_rate: u32,
    /// Request id assigned by the server during the handshake.
    pub request_id: String,
}

// =============================================================================
// STT
// =============================================================================

/// Parameters for a transcription session.
#[derive(Debug, Clone, Default)]
pub struct SttParams {
    pub input_format: InputFormat,
    /// Model name; empty resolves to [`DEFAULT_MODEL_NAME`] at session open.
    pub model_name: String,
}

/// Handshake information for a transcription session.
#[derive(Debug, Clone, Deserialize)]
pub struct SttReadyInfo {
    pub request_id: String,
    #[serde(default)]
    pub model_name: String,
    /// Expected input sample rate in Hz.
    #[serde(default)]
    pub sample_rate: u32,
    /// Samples per model frame.
    #[serde(default)]
    pub frame_size: u32,
    /// Model lookahead, in steps.
    #[serde(default)]
    pub delay_in_tokens: u32,
    /// Named sub-streams the server will emit text for.
    #[serde(default)]
    pub text_stream_names: Vec<String>,
}

/// One transcript segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SttTextResult {
    pub text: String,
    /// Segment start offset in seconds.
    pub start_s: f64,
    #[serde(default)]
    pub stream_id: Option<i64>,
}

/// Voice-activity prediction over one horizon.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct VadPrediction {
    /// Prediction horizon in seconds.
    pub horizon_s: f64,
    /// Probability that the speaker is inactive over that horizon.
    pub inactivity_prob: f64,
}

/// Periodic per-step report carrying voice-activity predictions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SttStepResult {
    pub vad: Vec<VadPrediction>,
    pub step_idx: u64,
    pub step_duration_s: f64,
    pub total_duration_s: f64,
}

/// Marker closing one transcript segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SttEndTextResult {
    /// Segment stop offset in seconds.
    pub stop_s: f64,
    #[serde(default)]
    pub stream_id: Option<i64>,
}

/// Unified feed item: every structured category in wire arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SttEvent {
    Text(SttTextResult),
    Step(SttStepResult),
    EndText(SttEndTextResult),
}

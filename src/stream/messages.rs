//! WebSocket message types for the Gradium speech stream.
//!
//! All frames are JSON with a `type` discriminant. Parsing peeks at the
//! discriminant first: unrecognized types map to [`ServerMessage::Unknown`]
//! so newer server message kinds never break an active session, and a
//! recognized type with a malformed payload is a parse error the dispatcher
//! drops rather than a fatal condition.

use serde::{Deserialize, Serialize};

use crate::types::{SttEndTextResult, SttReadyInfo, SttStepResult, SttTextResult};

/// Message type discriminants shared by both stream directions.
pub(crate) const MSG_TYPE_READY: &str = "ready";
pub(crate) const MSG_TYPE_ERROR: &str = "error";
pub(crate) const MSG_TYPE_END_OF_STREAM: &str = "end_of_stream";

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Setup frame opening a synthesis session.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TtsSetupMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub voice_id: String,
    pub output_format: crate::types::OutputFormat,
    pub model_name: String,
    /// Capability-specific configuration, forwarded verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_config: Option<serde_json::Value>,
}

/// Setup frame opening a transcription session.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SttSetupMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub input_format: crate::types::InputFormat,
    pub model_name: String,
}

/// Text chunk to synthesize.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TextMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub text: String,
}

impl TextMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            message_type: "text",
            text: text.into(),
        }
    }
}

/// Base64-encoded audio chunk to transcribe.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AudioMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub audio: String,
}

impl AudioMessage {
    pub fn new(encoded: String) -> Self {
        Self {
            message_type: "audio",
            audio: encoded,
        }
    }
}

/// End-of-stream sentinel, valid in both directions.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct EndOfStreamMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
}

impl Default for EndOfStreamMessage {
    fn default() -> Self {
        Self {
            message_type: MSG_TYPE_END_OF_STREAM,
        }
    }
}

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

/// Handshake acknowledgement. TTS sessions only populate `request_id`; the
/// remaining fields describe the transcription input contract.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReadyMessage {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub sample_rate: u32,
    #[serde(default)]
    pub frame_size: u32,
    #[serde(default)]
    pub delay_in_tokens: u32,
    #[serde(default)]
    pub text_stream_names: Vec<String>,
}

impl From<ReadyMessage> for SttReadyInfo {
    fn from(msg: ReadyMessage) -> Self {
        SttReadyInfo {
            request_id: msg.request_id,
            model_name: msg.model_name,
            sample_rate: msg.sample_rate,
            frame_size: msg.frame_size,
            delay_in_tokens: msg.delay_in_tokens,
            text_stream_names: msg.text_stream_names,
        }
    }
}

/// Base64-encoded audio chunk produced by synthesis.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InboundAudioMessage {
    pub audio: String,
}

/// Structured error frame. Terminal for the session.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorMessage {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

/// One decoded inbound frame.
#[derive(Debug)]
pub(crate) enum ServerMessage {
    /// Handshake acknowledgement.
    Ready(ReadyMessage),
    /// Synthesized audio chunk (still base64-encoded).
    Audio(InboundAudioMessage),
    /// Transcript segment.
    Text(SttTextResult),
    /// Periodic step report with voice-activity predictions.
    Step(SttStepResult),
    /// End-of-segment marker.
    EndText(SttEndTextResult),
    /// End-of-stream sentinel.
    EndOfStream,
    /// Terminal server error.
    Error(ErrorMessage),
    /// Unrecognized message type, kept for forward compatibility.
    Unknown(String),
}

impl ServerMessage {
    /// Parse a raw JSON frame into the appropriate message.
    ///
    /// Returns `Err` when the frame is not JSON, has no `type` field, or has
    /// a recognized type with a malformed payload. Callers discard such
    /// frames and keep reading.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct TypePeek {
            #[serde(rename = "type")]
            message_type: String,
        }

        let peek: TypePeek = serde_json::from_str(text)?;

        match peek.message_type.as_str() {
            MSG_TYPE_READY => Ok(ServerMessage::Ready(serde_json::from_str(text)?)),
            "audio" => Ok(ServerMessage::Audio(serde_json::from_str(text)?)),
            "text" => Ok(ServerMessage::Text(serde_json::from_str(text)?)),
            "step" => Ok(ServerMessage::Step(serde_json::from_str(text)?)),
            "end_text" => Ok(ServerMessage::EndText(serde_json::from_str(text)?)),
            MSG_TYPE_END_OF_STREAM => Ok(ServerMessage::EndOfStream),
            MSG_TYPE_ERROR => Ok(ServerMessage::Error(serde_json::from_str(text)?)),
            _ => Ok(ServerMessage::Unknown(peek.message_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ready_message_tts() {
        let json = r#"{"type":"ready","request_id":"req-42"}"#;
        let msg = ServerMessage::parse(json).unwrap();
        match msg {
            ServerMessage::Ready(ready) => {
                assert_eq!(ready.request_id, "req-42");
                assert_eq!(ready.sample_rate, 0);
            }
            _ => panic!("Expected Ready message"),
        }
    }

    #[test]
    fn test_parse_ready_message_stt() {
        let json = r#"{
            "type": "ready",
            "request_id": "req-7",
            "model_name": "default",
            "sample_rate": 24000,
            "frame_size": 1920,
            "delay_in_tokens": 6,
            "text_stream_names": ["main"]
        }"#;
        let msg = ServerMessage::parse(json).unwrap();
        match msg {
            ServerMessage::Ready(ready) => {
                let info: crate::types::SttReadyInfo = ready.into();
                assert_eq!(info.sample_rate, 24000);
                assert_eq!(info.frame_size, 1920);
                assert_eq!(info.text_stream_names, vec!["main".to_string()]);
            }
            _ => panic!("Expected Ready message"),
        }
    }

    #[test]
    fn test_parse_audio_message() {
        let json = r#"{"type":"audio","audio":"YWJjZA=="}"#;
        let msg = ServerMessage::parse(json).unwrap();
        match msg {
            ServerMessage::Audio(audio) => assert_eq!(audio.audio, "YWJjZA=="),
            _ => panic!("Expected Audio message"),
        }
    }

    #[test]
    fn test_parse_text_message() {
        let json = r#"{"type":"text","text":"Hello","start_s":0.4,"stream_id":1}"#;
        let msg = ServerMessage::parse(json).unwrap();
        match msg {
            ServerMessage::Text(text) => {
                assert_eq!(text.text, "Hello");
                assert_eq!(text.stream_id, Some(1));
            }
            _ => panic!("Expected Text message"),
        }
    }

    #[test]
    fn test_parse_step_message() {
        let json = r#"{
            "type": "step",
            "vad": [
                {"horizon_s": 0.5, "inactivity_prob": 0.1},
                {"horizon_s": 1.0, "inactivity_prob": 0.3}
            ],
            "step_idx": 12,
            "step_duration_s": 0.08,
            "total_duration_s": 0.96
        }"#;
        let msg = ServerMessage::parse(json).unwrap();
        match msg {
            ServerMessage::Step(step) => {
                assert_eq!(step.vad.len(), 2);
                assert_eq!(step.step_idx, 12);
            }
            _ => panic!("Expected Step message"),
        }
    }

    #[test]
    fn test_parse_end_text_message() {
        let json = r#"{"type":"end_text","stop_s":2.5}"#;
        let msg = ServerMessage::parse(json).unwrap();
        match msg {
            ServerMessage::EndText(end) => {
                assert!((end.stop_s - 2.5).abs() < f64::EPSILON);
                assert_eq!(end.stream_id, None);
            }
            _ => panic!("Expected EndText message"),
        }
    }

    #[test]
    fn test_parse_end_of_stream() {
        let msg = ServerMessage::parse(r#"{"type":"end_of_stream"}"#).unwrap();
        assert!(matches!(msg, ServerMessage::EndOfStream));
    }

    #[test]
    fn test_parse_error_message() {
        let json = r#"{"type":"error","message":"Invalid voice ID","code":400}"#;
        let msg = ServerMessage::parse(json).unwrap();
        match msg {
            ServerMessage::Error(err) => {
                assert_eq!(err.message, "Invalid voice ID");
                assert_eq!(err.code, Some(400));
            }
            _ => panic!("Expected Error message"),
        }
    }

    #[test]
    fn test_parse_unknown_message_type() {
        let msg = ServerMessage::parse(r#"{"type":"future_thing","data":1}"#).unwrap();
        match msg {
            ServerMessage::Unknown(kind) => assert_eq!(kind, "future_thing"),
            _ => panic!("Expected Unknown message"),
        }
    }

    #[test]
    fn test_parse_malformed_payload_is_error() {
        // Recognized type, wrong payload shape.
        assert!(ServerMessage::parse(r#"{"type":"step","vad":"nope"}"#).is_err());
        // Not JSON at all.
        assert!(ServerMessage::parse("not json").is_err());
        // Missing discriminant.
        assert!(ServerMessage::parse(r#"{"audio":"YWJjZA=="}"#).is_err());
    }

    #[test]
    fn test_tts_setup_serialization() {
        let setup = TtsSetupMessage {
            message_type: "setup",
            voice_id: "voice-1".to_string(),
            output_format: crate::types::OutputFormat::Pcm,
            model_name: "default".to_string(),
            json_config: None,
        };
        let json = serde_json::to_string(&setup).unwrap();
        assert!(json.contains(r#""type":"setup""#));
        assert!(json.contains(r#""voice_id":"voice-1""#));
        assert!(json.contains(r#""output_format":"pcm""#));
        assert!(!json.contains("json_config"));
    }

    #[test]
    fn test_tts_setup_forwards_config() {
        let setup = TtsSetupMessage {
            message_type: "setup",
            voice_id: "voice-1".to_string(),
            output_format: crate::types::OutputFormat::Wav,
            model_name: "default".to_string(),
            json_config: Some(serde_json::json!({"padding_bonus": -1.5})),
        };
        let json = serde_json::to_string(&setup).unwrap();
        assert!(json.contains(r#""json_config":{"padding_bonus":-1.5}"#));
    }

    #[test]
    fn test_stt_setup_serialization() {
        let setup = SttSetupMessage {
            message_type: "setup",
            input_format: crate::types::InputFormat::Pcm,
            model_name: "default".to_string(),
        };
        let json = serde_json::to_string(&setup).unwrap();
        assert_eq!(
            json,
            r#"{"type":"setup","input_format":"pcm","model_name":"default"}"#
        );
    }

    #[test]
    fn test_end_of_stream_serialization() {
        let json = serde_json::to_string(&EndOfStreamMessage::default()).unwrap();
        assert_eq!(json, r#"{"type":"end_of_stream"}"#);
    }

    #[test]
    fn test_text_message_serialization() {
        let json = serde_json::to_string(&TextMessage::new("Hello, world!")).unwrap();
        assert_eq!(json, r#"{"type":"text","text":"Hello, world!"}"#);
    }
}

//! Realtime vendor event protocol.
//!
//! Every frame is a JSON object tagged by `type`. Server events the session
//! does not handle decode to [`ServerEvent::Unknown`] instead of failing.

use serde::{Deserialize, Serialize};
use voxcart_core::types::Role;

// =============================================================================
// Client -> vendor
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    /// One base64-encoded chunk of caller audio.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
        }
    }
}

/// Session parameters sent on connect and after every reconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: Option<InputAudioTranscription>,
    pub turn_detection: Option<TurnDetection>,
    pub temperature: f32,
    pub max_response_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    /// A system message carrying grounding text.
    pub fn system_text(text: impl Into<String>) -> Self {
        Self {
            kind: "message".to_string(),
            role: Role::System,
            content: vec![ContentPart {
                kind: "input_text".to_string(),
                text: text.into(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

// =============================================================================
// Vendor -> client
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: serde_json::Value,
    },
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: serde_json::Value,
    },
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
    },
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: u64,
    },
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioCommitted {
        #[serde(default)]
        item_id: String,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        #[serde(default)]
        item_id: String,
        transcript: String,
    },
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        #[serde(default)]
        response_id: String,
        delta: String,
    },
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        response_id: String,
        transcript: String,
    },
    /// One base64-encoded chunk of synthesized audio.
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: String,
        delta: String,
    },
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: serde_json::Value,
    },
    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated {
        #[serde(default)]
        item: serde_json::Value,
    },
    #[serde(rename = "error")]
    Error { error: VendorError },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorError {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_events_are_type_tagged() {
        let json = serde_json::to_value(ClientEvent::ResponseCancel).unwrap();
        assert_eq!(json, serde_json::json!({"type": "response.cancel"}));

        let json = serde_json::to_value(ClientEvent::InputAudioBufferAppend {
            audio: "AAEC".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "input_audio_buffer.append");
        assert_eq!(json["audio"], "AAEC");

        for event in [
            ClientEvent::ResponseCreate,
            ClientEvent::ResponseCancel,
            ClientEvent::ConversationItemCreate {
                item: ConversationItem::system_text("x"),
            },
        ] {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }

    #[test]
    fn test_system_item_shape() {
        let json = serde_json::to_value(ClientEvent::ConversationItemCreate {
            item: ConversationItem::system_text("Refund created"),
        })
        .unwrap();
        assert_eq!(json["item"]["type"], "message");
        assert_eq!(json["item"]["role"], "system");
        assert_eq!(json["item"]["content"][0]["type"], "input_text");
        assert_eq!(json["item"]["content"][0]["text"], "Refund created");
    }

    #[test]
    fn test_decode_transcript_completed() {
        let raw = r#"{
            "type": "conversation.item.input_audio_transcription.completed",
            "event_id": "evt_1",
            "item_id": "item_7",
            "content_index": 0,
            "transcript": "mera order kahan hai"
        }"#;
        let event: ServerEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            ServerEvent::InputTranscriptionCompleted {
                item_id: "item_7".to_string(),
                transcript: "mera order kahan hai".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_unknown_event() {
        let raw = r#"{"type": "rate_limits.updated", "rate_limits": []}"#;
        let event: ServerEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn test_decode_vendor_error() {
        let raw = r#"{
            "type": "error",
            "error": {"type": "invalid_request_error", "code": "bad_audio", "message": "Invalid audio"}
        }"#;
        match serde_json::from_str::<ServerEvent>(raw).unwrap() {
            ServerEvent::Error { error } => {
                assert_eq!(error.kind, "invalid_request_error");
                assert_eq!(error.code.as_deref(), Some("bad_audio"));
                assert_eq!(error.message, "Invalid audio");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_lifecycle_without_payload() {
        let event: ServerEvent = serde_json::from_str(r#"{"type": "response.done"}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::ResponseDone {
                response: serde_json::Value::Null
            }
        );
        let event: ServerEvent =
            serde_json::from_str(r#"{"type": "input_audio_buffer.speech_started"}"#).unwrap();
        assert_eq!(event, ServerEvent::SpeechStarted { audio_start_ms: 0 });
    }
}

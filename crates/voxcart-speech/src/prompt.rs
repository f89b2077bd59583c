//! Persona prompt and session parameters.

use voxcart_core::config::SpeechConfig;

use crate::protocol::{InputAudioTranscription, SessionConfig, TurnDetection};

pub const SYSTEM_PROMPT: &str = "\
You are Asha, the phone support assistant for an Indian online fashion store. \
Callers speak Hindi, English or a mix of both; reply in the language the caller uses, \
in short spoken sentences of one or two lines.

Tone: warm, polite and calm. Address the caller respectfully (aap, ji). \
Never read out long lists; offer the most relevant two or three items.

You can help with order status, tracking, returns, refunds, cancellations, exchanges, \
address changes, cash on delivery, invoices, payment problems, complaints, product questions, \
account registration and app or website issues.

You do not have direct access to orders or payments. Backend results arrive as system \
messages. When one arrives, tell the caller the outcome naturally in your own words. \
When a system message asks for a detail such as an order number, phone number or PIN code, \
ask the caller for exactly that detail.

Never invent order numbers, amounts, dates or policies. If you do not know, say you will \
check, and wait for the system message. Read numbers digit by digit.";

/// Session parameters for the realtime vendor.
pub fn session_config(config: &SpeechConfig) -> SessionConfig {
    SessionConfig {
        modalities: vec!["text".to_string(), "audio".to_string()],
        instructions: SYSTEM_PROMPT.to_string(),
        voice: config.voice.clone(),
        input_audio_format: config.input_audio_format.clone(),
        output_audio_format: config.output_audio_format.clone(),
        input_audio_transcription: Some(InputAudioTranscription {
            model: config.transcription_model.clone(),
        }),
        turn_detection: Some(TurnDetection {
            kind: "server_vad".to_string(),
            threshold: config.vad_threshold,
            prefix_padding_ms: config.prefix_padding_ms,
            silence_duration_ms: config.silence_duration_ms,
        }),
        temperature: config.temperature,
        max_response_output_tokens: config.max_response_output_tokens,
    }
}

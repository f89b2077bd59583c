use serde::{Deserialize, Serialize};

use crate::types::{CallId, Role, Timestamp};

/// Domain events emitted by the call-handling service.
///
/// Published on a broadcast channel by the call session manager and consumed
/// by the event log and any observer attached by the binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CallEvent {
    /// A telephony leg connected and its speech session opened.
    CallStarted {
        call_id: CallId,
        timestamp: Timestamp,
    },

    /// A call was torn down.
    CallEnded {
        call_id: CallId,
        duration_secs: u64,
        timestamp: Timestamp,
    },

    /// A final transcript (user or assistant) was appended to the conversation.
    TranscriptReceived {
        call_id: CallId,
        role: Role,
        text_length: usize,
        timestamp: Timestamp,
    },

    /// An utterance was classified.
    IntentDetected {
        call_id: CallId,
        intent: String,
        confidence: f64,
        timestamp: Timestamp,
    },

    /// An agent was launched (or an existing one received more data).
    AgentLaunched {
        call_id: CallId,
        agent_type: String,
        timestamp: Timestamp,
    },

    /// An agent reached a terminal state.
    AgentFinished {
        call_id: CallId,
        agent_type: String,
        outcome: String,
        success: bool,
        timestamp: Timestamp,
    },

    /// The vendor connection dropped and was re-established.
    SpeechReconnected {
        call_id: CallId,
        attempt: u32,
        timestamp: Timestamp,
    },

    /// The speech session gave up; the call is being ended.
    SpeechFailed {
        call_id: CallId,
        reason: String,
        timestamp: Timestamp,
    },
}

impl CallEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            CallEvent::CallStarted { timestamp, .. }
            | CallEvent::CallEnded { timestamp, .. }
            | CallEvent::TranscriptReceived { timestamp, .. }
            | CallEvent::IntentDetected { timestamp, .. }
            | CallEvent::AgentLaunched { timestamp, .. }
            | CallEvent::AgentFinished { timestamp, .. }
            | CallEvent::SpeechReconnected { timestamp, .. }
            | CallEvent::SpeechFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the call the event belongs to.
    pub fn call_id(&self) -> &CallId {
        match self {
            CallEvent::CallStarted { call_id, .. }
            | CallEvent::CallEnded { call_id, .. }
            | CallEvent::TranscriptReceived { call_id, .. }
            | CallEvent::IntentDetected { call_id, .. }
            | CallEvent::AgentLaunched { call_id, .. }
            | CallEvent::AgentFinished { call_id, .. }
            | CallEvent::SpeechReconnected { call_id, .. }
            | CallEvent::SpeechFailed { call_id, .. } => call_id,
        }
    }

    /// Returns a snake_case event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            CallEvent::CallStarted { .. } => "call_started",
            CallEvent::CallEnded { .. } => "call_ended",
            CallEvent::TranscriptReceived { .. } => "transcript_received",
            CallEvent::IntentDetected { .. } => "intent_detected",
            CallEvent::AgentLaunched { .. } => "agent_launched",
            CallEvent::AgentFinished { .. } => "agent_finished",
            CallEvent::SpeechReconnected { .. } => "speech_reconnected",
            CallEvent::SpeechFailed { .. } => "speech_failed",
        }
    }
}

//! Intent detection for caller utterances.
//!
//! Classification runs in a fixed order: cancel phrases, short greetings,
//! then the business intents by priority, falling back to plain chat.
//! Entities are extracted on every path.

pub mod entities;
pub mod patterns;

use voxcart_core::types::ConversationEntry;

use crate::types::{Intent, IntentResult};

pub use entities::{is_waiting_for_entity, EntityExtractor};
pub use patterns::PatternSet;

pub const CANCEL_CONFIDENCE: f32 = 0.95;
pub const GREETING_CONFIDENCE: f32 = 0.9;
pub const BUSINESS_CONFIDENCE: f32 = 0.85;
pub const CHAT_CONFIDENCE: f32 = 0.7;

/// Greetings only count when the whole utterance is this short.
const GREETING_MAX_CHARS: usize = 20;

/// Stateless utterance classifier. Compiles its patterns once.
#[derive(Default)]
pub struct IntentDetector {
    patterns: PatternSet,
    extractor: EntityExtractor,
}

impl IntentDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one utterance. `context` is the recent conversation, used
    /// to resolve bare numbers the assistant just asked for.
    pub fn detect(&self, transcript: &str, context: &[ConversationEntry]) -> IntentResult {
        let text = transcript.trim().to_lowercase();
        let mut entities = self.extractor.extract(&text);

        if self.patterns.is_cancel_action(&text) {
            return IntentResult {
                intent: Intent::CancelAction,
                confidence: CANCEL_CONFIDENCE,
                entities,
                requires_agent: false,
                agent_type: None,
                should_cancel_agent: true,
            };
        }

        if text.chars().count() < GREETING_MAX_CHARS && self.patterns.is_greeting(&text) {
            return Self::conversational(Intent::Greeting, GREETING_CONFIDENCE, entities);
        }

        if let Some(intent) = self.patterns.match_business(&text) {
            tracing::debug!(intent = %intent, "Business intent detected");
            return IntentResult {
                intent,
                confidence: BUSINESS_CONFIDENCE,
                entities,
                requires_agent: true,
                agent_type: intent.agent_type(),
                should_cancel_agent: false,
            };
        }

        if let Some(expected) = is_waiting_for_entity(context) {
            entities::apply_lookback(&mut entities, expected);
        }
        Self::conversational(Intent::Chat, CHAT_CONFIDENCE, entities)
    }

    fn conversational(
        intent: Intent,
        confidence: f32,
        entities: crate::types::FieldMap,
    ) -> IntentResult {
        IntentResult {
            intent,
            confidence,
            entities,
            requires_agent: false,
            agent_type: None,
            should_cancel_agent: false,
        }
    }
}

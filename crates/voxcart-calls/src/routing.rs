//! What to do with one classified caller utterance.

use voxcart_agents::{AgentType, FieldMap, Intent, IntentResult};

/// Fields an agent accepts as the caller's own words.
pub const FREE_TEXT_FIELDS: &[&str] = &[
    "reason",
    "new_address",
    "issue_description",
    "complaint_details",
    "product_query",
];

/// Spoken when an agent reports an error.
pub const AGENT_ERROR_CONTEXT: &str = "The request could not be completed because of a \
technical problem. Apologise to the caller, tell them a support specialist will follow up, \
and ask if there is anything else you can help with.";

/// Spoken when the caller asked to drop the current request.
pub const CANCELLED_CONTEXT: &str = "The caller asked to stop the current request and it has \
been cancelled. Confirm this briefly and ask if there is anything else you can help with.";

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Cancel the call's live agent.
    Cancel,
    /// Launch (or feed) an agent of this type.
    Launch(AgentType, FieldMap),
    /// Give the waiting agent more data.
    Update(FieldMap),
    /// Nothing for the backend; the speech model handles it.
    Converse,
}

/// Decide how an utterance reaches the orchestrator.
///
/// `waiting` is the call's agent type and pending field when an agent is
/// waiting for info. An utterance carrying the pending field always feeds
/// that agent, even if its wording matches another intent.
pub fn route_transcript(
    result: IntentResult,
    waiting: Option<(AgentType, &str)>,
    transcript: &str,
) -> Route {
    if result.should_cancel_agent {
        return Route::Cancel;
    }

    let entities = result.entities;

    if let Some((waiting_type, field)) = waiting {
        if entities.contains_key(field) {
            return Route::Update(entities);
        }
        // Numbers inside free text (PIN codes, house numbers) are not entities here.
        let same_agent = result.agent_type == Some(waiting_type);
        let chatting = result.intent == Intent::Chat;
        if (same_agent || chatting) && FREE_TEXT_FIELDS.contains(&field) {
            let mut data = FieldMap::new();
            data.insert(field.to_string(), transcript.trim().to_string());
            return Route::Update(data);
        }
    }

    if result.requires_agent {
        if let Some(agent_type) = result.agent_type {
            return Route::Launch(agent_type, entities);
        }
    }

    if waiting.is_some() && !entities.is_empty() {
        return Route::Update(entities);
    }
    Route::Converse
}

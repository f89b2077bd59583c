//! Entity extraction from caller utterances.
//!
//! Each entity has an ordered list of patterns; the first one that matches
//! supplies the value. Extraction does not reconcile overlapping entities
//! (a ten-digit mobile number also reads as an order id); the detector's
//! look-back does that when the assistant has just asked for one of them.

use regex::Regex;
use voxcart_core::types::{ConversationEntry, Role};

use crate::types::FieldMap;

/// How many recent assistant turns the look-back inspects.
const LOOKBACK_TURNS: usize = 3;

const ORDER_ID_PATTERNS: &[&str] = &[
    r"order\s*(?:id|number|no\.?|#)?\s*(?:is|hai|:)?\s*#?\s*(\d{4,10})\b",
    r"#(\d{4,10})\b",
    r"\b(\d{4,10})\b",
];

const PHONE_PATTERNS: &[&str] = &[
    r"(?:\+91[\s-]?|\b0|\b)([6-9]\d{9})\b",
    r"\b(\d{10})\b",
];

const EMAIL_PATTERNS: &[&str] = &[r"([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})"];

const AMOUNT_PATTERNS: &[&str] = &[
    r"(?:\brs\.?|\binr|₹)\s*(\d[\d,]*(?:\.\d{1,2})?)",
    r"(\d[\d,]*(?:\.\d{1,2})?)\s*(?:rupees|rupaye|rupay|rupee)\b",
];

const PIN_CODE_PATTERNS: &[&str] = &[r"pin\s*(?:code)?\s*(?:is|hai|:)?\s*(\d{6})\b"];

/// Compiled entity patterns, in extraction order.
pub struct EntityExtractor {
    entities: Vec<(&'static str, Vec<Regex>)>,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor {
    pub fn new() -> Self {
        let table: [(&'static str, &[&str]); 5] = [
            ("order_id", ORDER_ID_PATTERNS),
            ("phone", PHONE_PATTERNS),
            ("email", EMAIL_PATTERNS),
            ("amount", AMOUNT_PATTERNS),
            ("pin_code", PIN_CODE_PATTERNS),
        ];
        Self {
            entities: table
                .into_iter()
                .map(|(name, patterns)| {
                    let compiled = patterns
                        .iter()
                        .map(|p| Regex::new(p).expect("Invalid entity regex"))
                        .collect();
                    (name, compiled)
                })
                .collect(),
        }
    }

    /// Extract every entity found in a lowercased utterance.
    pub fn extract(&self, text: &str) -> FieldMap {
        let mut found = FieldMap::new();
        for (name, patterns) in &self.entities {
            let value = patterns
                .iter()
                .find_map(|re| re.captures(text))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());
            if let Some(value) = value {
                let value = if *name == "amount" {
                    value.replace(',', "")
                } else {
                    value
                };
                found.insert(name.to_string(), value);
            }
        }
        found
    }
}

/// Which entity the assistant asked for in its last few turns, if any.
/// The most recent matching turn wins.
pub fn is_waiting_for_entity(context: &[ConversationEntry]) -> Option<&'static str> {
    context
        .iter()
        .rev()
        .filter(|entry| entry.role == Role::Assistant)
        .take(LOOKBACK_TURNS)
        .find_map(|entry| requested_entity(&entry.content.to_lowercase()))
}

fn requested_entity(text: &str) -> Option<&'static str> {
    if text.contains("order") && text.contains("number") {
        Some("order_id")
    } else if text.contains("phone") || text.contains("mobile") {
        Some("phone")
    } else if text
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "pin" || word == "pincode")
    {
        Some("pin_code")
    } else {
        None
    }
}

/// Re-key a bare number onto the entity the assistant asked for.
pub(crate) fn apply_lookback(entities: &mut FieldMap, expected: &str) {
    match expected {
        "phone" => {
            if !entities.contains_key("phone") {
                if let Some(number) = entities.get("order_id").cloned() {
                    entities.insert("phone".to_string(), number);
                }
            }
            if entities.get("order_id") == entities.get("phone") {
                entities.remove("order_id");
            }
        }
        "pin_code" => {
            if !entities.contains_key("pin_code") {
                let six_digits = entities
                    .get("order_id")
                    .filter(|n| n.len() == 6 && !n.starts_with('0'))
                    .cloned();
                if let Some(number) = six_digits {
                    entities.insert("pin_code".to_string(), number);
                }
            }
            if entities.get("order_id") == entities.get("pin_code") {
                entities.remove("order_id");
            }
        }
        "order_id" => {
            let order_id = entities.get("order_id");
            if order_id.is_some() && entities.get("phone") == order_id {
                entities.remove("phone");
            }
        }
        _ => {}
    }
}

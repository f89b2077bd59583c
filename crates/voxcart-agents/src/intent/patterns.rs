//! Ordered intent pattern tables.
//!
//! Patterns mix English, Hindi and Hinglish phrasing and run against the
//! lowercased utterance. Table order is priority: the first business intent
//! with any matching pattern wins.

use regex::Regex;

use crate::types::Intent;

/// Phrases that abandon whatever is in progress.
const CANCEL_ACTION_PATTERNS: &[&str] = &[
    r"\b(?:rehne|rahne)\s+do\b",
    r"\b(?:chhodo|chodo|chhod\s+do|chod\s+do)\b",
    r"\bnever\s*mind\b",
    r"\bforget\s+(?:it|about\s+it)\b",
    r"\bnahi\s+chahiye\b",
    r"\bmat\s+karo\b",
    r"\bstop\s+(?:that|this|it)\b",
    r"\bkoi\s+baat\s+nahi\b",
    r"\bleave\s+it\b",
];

/// "cancel that" abandons the agent unless an order is named with it.
const CANCEL_PRONOUN_PATTERN: &str = r"\bcancel\s+(?:that|this|it)\b";
const ORDER_WORD_PATTERN: &str = r"\border\b";

const GREETING_PATTERNS: &[&str] = &[
    r"^(?:hi|hello|hey|hii+|namaste|namaskar|namaskaar)\b",
    r"^good\s+(?:morning|afternoon|evening)\b",
];

/// Business intents in priority order.
const BUSINESS_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::OrderLookup,
        &[
            r"\border\s+status\b",
            r"\border\s+ka\s+status\b",
            r"\b(?:mera|meri|my)\s+order\b.*\b(?:kaha|kahan|kidhar|where)\b",
            r"\bwhere\s+is\s+my\s+order\b",
            r"\border\s+(?:details|detail|information|info)\b",
            r"\bcheck\s+(?:my\s+)?order\b",
            r"\border\s+(?:ki|ke\s+bare\s+mein)\s+(?:jankari|jaankari)\b",
        ],
    ),
    (
        Intent::Return,
        &[
            r"\breturn\b",
            r"\b(?:wapas|vapas)\s+(?:karna|karni|karo|kar\s+do|kardo|bhejna|lena|le\s+lo)\b",
            r"\b(?:product|item|saman|samaan|cheez)\s+(?:wapas|vapas)\b",
            r"\blautana\b",
        ],
    ),
    (
        Intent::Refund,
        &[
            r"\brefund\b",
            r"\b(?:paise|paisa|paison)\s+(?:wapas|vapas)\b",
            r"\bmoney\s+back\b",
            r"\b(?:get|want)\s+my\s+money\b",
        ],
    ),
    (
        Intent::CancelOrder,
        &[
            r"\bcancel\s+(?:my\s+|the\s+|this\s+)?order\b",
            r"\bcancel\s+(?:it|that|this)\b.*\border\b",
            r"\border\s+(?:cancel|radd)\b",
            r"\border\b.*\b(?:cancel|radd)\s+(?:karna|karni|karo|kar\s+do|kardo)\b",
            r"\b(?:cancel|radd)\s+(?:karna|karni|karo|kar\s+do|kardo)\b",
            r"\bcancellation\b",
        ],
    ),
    (
        Intent::Tracking,
        &[
            r"\btrack(?:ing)?\b",
            r"\b(?:kab|kb)\s+(?:tak\s+)?(?:aayega|ayega|aaega|aaegi|aayegi|milega|milegi|pahunchega|deliver)\b",
            r"\bdelivery\s+(?:kab|status|date)\b",
            r"\bwhen\s+will\s+(?:it|my\s+order|my\s+package|my\s+parcel)\s+(?:arrive|come|be\s+delivered)\b",
            r"\b(?:shipment|courier|parcel)\b",
            r"\bout\s+for\s+delivery\b",
        ],
    ),
    (
        Intent::Complaint,
        &[
            r"\bcomplain(?:t)?\b",
            r"\bshikayat\b",
            r"\b(?:damaged|broken|toota|tuta|defective|phata)\b",
            r"\bwrong\s+(?:item|product|size|colou?r)\b",
            r"\bgalat\s+(?:saman|samaan|product|item|cheez)\b",
            r"\bbahut\s+(?:bura|ganda|kharab)\b",
            r"\b(?:not\s+happy|worst|pathetic|disappointed)\b",
        ],
    ),
    (
        Intent::ProductInquiry,
        &[
            r"\b(?:price|cost|rate|daam)\b",
            r"\bkitne\s+ka\b",
            r"\bkitna\s+(?:hai|price|ka)\b",
            r"\b(?:in\s+stock|available|availability)\b",
            r"\b(?:product|item)\s+(?:details|info|information)\b",
            r"\b(?:do\s+you\s+have|aapke\s+paas)\b",
            r"\b(?:size|colou?r)\s+(?:options|chart)\b",
            r"\bmilta\s+hai\b",
        ],
    ),
    (
        Intent::PaymentIssue,
        &[
            r"\bpayment\s+(?:fail|failed|nahi\s+hua|issue|problem|stuck|pending|deducted)\b",
            r"\b(?:paise|paisa)\s+(?:kat|cut)\s+(?:gaye|gye|gaya|gya)\b",
            r"\b(?:money|amount)\s+(?:deducted|debited)\b",
            r"\b(?:charged|debited|deducted)\s+twice\b",
            r"\bdouble\s+(?:charge|charged|payment)\b",
            r"\btransaction\s+(?:fail|failed|declined)\b",
        ],
    ),
    (
        Intent::AddressChange,
        &[
            r"\b(?:change|update|badal|badalna|badlo)\b.*\baddress\b",
            r"\baddress\b.*\b(?:change|update|badal|badalna|badlo|galat)\b",
            r"\b(?:new|naya|nayi)\s+address\b",
            r"\bdifferent\s+address\b",
            r"\bpata\s+(?:badal|badalna|change)\b",
        ],
    ),
    (
        Intent::Exchange,
        &[
            r"\bexchange\b",
            r"\breplace(?:ment)?\b",
            r"\b(?:size|colou?r)\s+(?:change|badal|badalna|badlo)\b",
            r"\b(?:dusra|doosra|dusri)\s+(?:size|colou?r|piece)\b",
            r"\bbadal\s*(?:kar|ke)\s*(?:do|dena|chahiye)\b",
        ],
    ),
    (
        Intent::Cod,
        &[
            r"\bcod\b",
            r"\bcash\s+on\s+delivery\b",
            r"\bcash\s+(?:me|mein|se)\s+(?:pay|payment|dena|dunga|dungi)\b",
            r"\bdelivery\s+(?:pe|par)\s+(?:pay|payment|paise|cash)\b",
            r"\bprepaid\b",
        ],
    ),
    (
        Intent::Invoice,
        &[
            r"\binvoice\b",
            r"\bbill\b",
            r"\breceipt\b",
            r"\bgst\b",
        ],
    ),
    (
        Intent::Registration,
        &[
            r"\b(?:register|registration|sign\s*up)\b",
            r"\b(?:create|new|naya|open)\b.*\baccount\b",
            r"\baccount\s+(?:banana|banao|bana\s+do|create|kholna)\b",
        ],
    ),
    (
        Intent::TechnicalSupport,
        &[
            r"\botp\b",
            r"\b(?:login|log\s+in|sign\s+in)\b",
            r"\bpassword\b",
            r"\bapp\b.*\b(?:crash|crashing|band|not\s+working|nahi\s+chal|error|hang)\b",
            r"\bwebsite\b.*\b(?:not|nahi|down|error|slow)\b",
            r"\b(?:technical|tech)\s+(?:issue|problem|support)\b",
            r"\berror\s+(?:aa\s+raha|aa\s+rha|coming|shows|dikha)\b",
        ],
    ),
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Invalid intent regex"))
        .collect()
}

/// All intent patterns, compiled once and reused.
pub struct PatternSet {
    cancel_action: Vec<Regex>,
    cancel_pronoun: Regex,
    order_word: Regex,
    greeting: Vec<Regex>,
    business: Vec<(Intent, Vec<Regex>)>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSet {
    pub fn new() -> Self {
        Self {
            cancel_action: compile(CANCEL_ACTION_PATTERNS),
            cancel_pronoun: Regex::new(CANCEL_PRONOUN_PATTERN).expect("Invalid cancel regex"),
            order_word: Regex::new(ORDER_WORD_PATTERN).expect("Invalid order regex"),
            greeting: compile(GREETING_PATTERNS),
            business: BUSINESS_PATTERNS
                .iter()
                .map(|(intent, patterns)| (*intent, compile(patterns)))
                .collect(),
        }
    }

    pub fn is_cancel_action(&self, text: &str) -> bool {
        self.cancel_action.iter().any(|re| re.is_match(text))
            || (self.cancel_pronoun.is_match(text) && !self.order_word.is_match(text))
    }

    pub fn is_greeting(&self, text: &str) -> bool {
        self.greeting.iter().any(|re| re.is_match(text))
    }

    /// First business intent, in priority order, with a matching pattern.
    pub fn match_business(&self, text: &str) -> Option<Intent> {
        self.business
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
            .map(|(intent, _)| *intent)
    }

    /// Business intents in priority order.
    pub fn priority(&self) -> Vec<Intent> {
        self.business.iter().map(|(intent, _)| *intent).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ps() -> PatternSet {
        PatternSet::new()
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(
            ps().priority(),
            vec![
                Intent::OrderLookup,
                Intent::Return,
                Intent::Refund,
                Intent::CancelOrder,
                Intent::Tracking,
                Intent::Complaint,
                Intent::ProductInquiry,
                Intent::PaymentIssue,
                Intent::AddressChange,
                Intent::Exchange,
                Intent::Cod,
                Intent::Invoice,
                Intent::Registration,
                Intent::TechnicalSupport,
            ]
        );
    }

    #[test]
    fn test_cancel_action_phrases() {
        let set = ps();
        for text in [
            "rehne do",
            "acha chhodo",
            "never mind",
            "forget it",
            "mujhe nahi chahiye",
            "cancel that",
            "koi baat nahi",
        ] {
            assert!(set.is_cancel_action(text), "{}", text);
        }
        assert!(!set.is_cancel_action("cancel my order"));
    }

    #[test]
    fn test_cancel_this_order_is_cancel_order() {
        let set = ps();
        for text in [
            "please cancel this order",
            "cancel this order 5001",
            "can you cancel it, order 5001",
        ] {
            assert!(!set.is_cancel_action(text), "{}", text);
            assert_eq!(set.match_business(text), Some(Intent::CancelOrder), "{}", text);
        }
        assert!(set.is_cancel_action("cancel it"));
        assert!(set.is_cancel_action("ok cancel this, thanks"));
    }

    #[test]
    fn test_greeting_anchored_at_start() {
        let set = ps();
        assert!(set.is_greeting("hello"));
        assert!(set.is_greeting("hiii"));
        assert!(set.is_greeting("good morning"));
        assert!(!set.is_greeting("say hello to my order"));
        assert!(!set.is_greeting("history of my order"));
    }

    #[test]
    fn test_single_intent_examples() {
        let set = ps();
        let cases = [
            ("mera order kahan hai", Intent::OrderLookup),
            ("i want to return this kurta", Intent::Return),
            ("refund kab milega", Intent::Refund),
            ("please cancel my order", Intent::CancelOrder),
            ("parcel kab aayega", Intent::Tracking),
            ("mujhe shikayat karni hai", Intent::Complaint),
            ("is this saree in stock", Intent::ProductInquiry),
            ("payment failed but paise kat gaye", Intent::PaymentIssue),
            ("mujhe address change karna hai", Intent::AddressChange),
            ("size badalna hai, exchange chahiye", Intent::Exchange),
            ("kya cash on delivery hai", Intent::Cod),
            ("gst invoice chahiye", Intent::Invoice),
            ("naya account banana hai", Intent::Registration),
            ("otp nahi aa raha", Intent::TechnicalSupport),
        ];
        for (text, expected) in cases {
            assert_eq!(set.match_business(text), Some(expected), "{}", text);
        }
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        let set = ps();
        // Return and refund both match; return is earlier.
        assert_eq!(
            set.match_business("i want to return it and get a refund"),
            Some(Intent::Return)
        );
        // Order status beats tracking.
        assert_eq!(
            set.match_business("order status and tracking please"),
            Some(Intent::OrderLookup)
        );
        // Complaint beats payment issue.
        assert_eq!(
            set.match_business("worst service, payment failed twice"),
            Some(Intent::Complaint)
        );
    }

    #[test]
    fn test_no_business_intent() {
        assert_eq!(ps().match_business("aaj mausam accha hai"), None);
        assert_eq!(ps().match_business(""), None);
    }
}

//! First-line technical support with scripted troubleshooting.

use async_trait::async_trait;
use serde_json::json;

use crate::agent::AgentContext;
use crate::error::AgentError;
use crate::handler::complaint::ticket_id;
use crate::handler::AgentHandler;
use crate::types::{AgentOutcome, AgentResult, AgentType};

pub struct TechnicalSupportAgent;

/// Keyword table, checked in order.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("otp", &["otp", "verification code", "code nahi aa"]),
    ("login", &["login", "log in", "sign in", "password", "account locked"]),
    ("payment_page", &["payment page", "checkout", "pay button", "payment gateway", "upi"]),
    ("app_crash", &["crash", "app band", "app closes", "app close", "freeze", "hang"]),
    ("website", &["website", "site", "page not loading", "browser", "link not working"]),
];

pub(crate) fn categorize(description: &str) -> &'static str {
    let text = description.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or("other")
}

pub(crate) fn troubleshooting_steps(category: &str) -> &'static [&'static str] {
    match category {
        "login" => &[
            "Use the 'Forgot password' option to reset the password",
            "Try logging in with OTP instead of the password",
            "Make sure the registered mobile number or email is used",
        ],
        "otp" => &[
            "Wait 60 seconds and tap 'Resend OTP'",
            "Check that the phone has network signal and SMS is not blocked",
            "Check the spam or promotions folder if the OTP was sent by email",
        ],
        "payment_page" => &[
            "Refresh the page and try the payment again",
            "Try a different payment method such as UPI or card",
            "Disable ad blockers or try another browser",
        ],
        "app_crash" => &[
            "Update the app to the latest version",
            "Clear the app cache from phone settings",
            "Uninstall and reinstall the app",
        ],
        "website" => &[
            "Clear the browser cache and cookies",
            "Try a different browser or incognito mode",
            "Check the internet connection",
        ],
        _ => &[],
    }
}

#[async_trait]
impl AgentHandler for TechnicalSupportAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::TechnicalSupport
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["issue_description"]
    }

    fn confidence(&self) -> f32 {
        0.8
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let description = ctx.require("issue_description")?;
        let action = ctx.record_action().await?;

        let category = categorize(description);
        let steps = troubleshooting_steps(category);
        let escalated = category == "other";
        let ticket = ticket_id("TS");

        let spoken = if escalated {
            format!(
                "Support ticket {} has been raised and passed to the technical team, who will contact the customer within 24 hours.",
                ticket
            )
        } else {
            format!(
                "Support ticket {} has been raised. Walk the customer through these steps one at a time: {}.",
                ticket,
                steps.join("; ")
            )
        };

        let result = AgentResult::success(
            format!("Support ticket {} raised", ticket),
            json!({
                "ticket_id": ticket,
                "category": category,
                "steps": steps,
                "escalated": escalated,
            }),
            spoken,
        );
        ctx.succeed(action, result).await
    }
}

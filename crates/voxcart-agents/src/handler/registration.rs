//! New customer registration over the phone.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use crate::agent::AgentContext;
use crate::commerce::NewCustomer;
use crate::error::AgentError;
use crate::handler::AgentHandler;
use crate::types::{AgentOutcome, AgentResult, AgentType};

static MOBILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[6-9]\d{9}$").expect("Invalid mobile regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("Invalid email regex")
});

/// Strip spaces, dashes and a leading +91 or 0, then require 10 digits
/// starting with 6-9.
pub(crate) fn normalize_mobile(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    let digits = digits
        .strip_prefix("+91")
        .or_else(|| digits.strip_prefix("91").filter(|d| d.len() == 10))
        .or_else(|| digits.strip_prefix('0').filter(|d| d.len() == 10))
        .unwrap_or(digits.as_str());
    MOBILE_RE.is_match(digits).then(|| digits.to_string())
}

pub(crate) fn is_valid_email(raw: &str) -> bool {
    EMAIL_RE.is_match(raw.trim())
}

pub struct RegistrationAgent;

#[async_trait]
impl AgentHandler for RegistrationAgent {
    fn agent_type(&self) -> AgentType {
        AgentType::Registration
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["phone", "email"]
    }

    fn prompt_for_field(&self, field: &str) -> Option<&'static str> {
        match field {
            "phone" => Some("To create your account, may I have your 10-digit mobile number?"),
            "email" => Some("And which email address would you like to register with?"),
            other => super::common_prompt(other),
        }
    }

    async fn execute(&self, ctx: &AgentContext) -> Result<AgentOutcome, AgentError> {
        let raw_phone = ctx.require("phone")?;
        let email = ctx.require("email")?.to_lowercase();
        let name = ctx.field("name").map(str::to_string);
        let action = ctx.record_action().await?;

        let Some(phone) = normalize_mobile(raw_phone) else {
            return ctx
                .reject(
                    action,
                    "Invalid mobile number",
                    "That mobile number does not look valid. Ask for a 10-digit Indian mobile number starting with 6, 7, 8 or 9.",
                )
                .await;
        };
        if !is_valid_email(&email) {
            return ctx
                .reject(
                    action,
                    "Invalid email address",
                    "That email address does not look valid. Ask the customer to spell it out.",
                )
                .await;
        }

        let request = NewCustomer {
            email: email.clone(),
            phone: phone.clone(),
            first_name: name.clone(),
        };
        let Some(customer) = ctx.commerce().create_customer(&request).await? else {
            return ctx
                .reject(
                    action,
                    "Account already exists",
                    "An account already exists with this mobile number or email. The customer can log in with OTP instead.",
                )
                .await;
        };

        let welcomed = ctx.commerce().send_welcome_message(&customer).await?;

        let greeting = name
            .as_deref()
            .map(|n| format!("Welcome, {}! ", n))
            .unwrap_or_default();
        let result = AgentResult::success(
            format!("Customer {} registered", customer.id),
            json!({
                "customer_id": customer.id,
                "phone": phone,
                "email": email,
                "welcome_sent": welcomed,
            }),
            format!(
                "{}The account has been created with mobile {} and email {}. A welcome message has been sent.",
                greeting, phone, email
            ),
        );
        ctx.succeed(action, result).await
    }
}

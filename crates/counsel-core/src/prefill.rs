use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::types::{ChatMessage, Facts, Role};

/// Prefix marking a provider-injected context turn. These turns seed the
/// fact baseline and are never shown to the model.
pub const CONTEXT_MARKER: &str = "System Context:";

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"located in ([^,]+),\s*([^.]+)").expect("static regex"))
}

fn issue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"legal issue is ([^.]+)").expect("static regex"))
}

pub fn is_context_turn(msg: &ChatMessage) -> bool {
    msg.role == Role::SystemContext || msg.content.starts_with(CONTEXT_MARKER)
}

/// Extract structured hints from the first tagged context turn in the
/// history. Subsequent tagged turns are ignored.
///
/// Recognizes a location clause ("located in <region>, <country>") and an
/// issue clause ("legal issue is <description>"). Partial extraction is
/// fine; no tagged turn (or no matching clause) yields an empty mapping.
pub fn parse_system_context(messages: &[ChatMessage]) -> Facts {
    let mut fields = Facts::new();

    let Some(turn) = messages.iter().find(|m| m.content.starts_with(CONTEXT_MARKER)) else {
        return fields;
    };
    debug!("context turn detected");

    if let Some(caps) = location_re().captures(&turn.content) {
        let state = caps[1].trim().to_string();
        let country = caps[2].trim().to_string();
        let jurisdiction = format!("{state}, {country}");
        debug!(%jurisdiction, "pre-fill location");
        fields.insert("state".into(), Value::String(state));
        fields.insert("country".into(), Value::String(country));
        fields.insert("jurisdiction".into(), Value::String(jurisdiction));
    }

    if let Some(caps) = issue_re().captures(&turn.content) {
        let issue = caps[1].trim().to_string();
        debug!(%issue, "pre-fill issue");
        fields.insert("issue".into(), Value::String(issue.clone()));
        fields.insert("case_type".into(), Value::String(issue));
    }

    fields
}

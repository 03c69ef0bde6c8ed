use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{Facts, STATUS_COMPLETE, STATUS_KEY};

// ── Capability seam ──────────────────────────────────────────────────────

/// A structured payload located inside free-form model output.
#[derive(Debug, Clone)]
pub struct Extracted {
    /// Verbatim matched text, kept so it can be stripped from the reply.
    pub raw: String,
    pub fields: Facts,
}

/// Locates an embedded key/value object in free-form text. A trait so a
/// stricter or model-assisted parser can replace the regex heuristic
/// without touching callers.
pub trait FactExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Option<Extracted>;
}

/// Best-effort extractor: leftmost brace-balanced object supporting one
/// level of nesting. A model that emits an object-shaped example before
/// the real payload will have the example consumed instead; accepted
/// limitation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexExtractor;

fn object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("static regex")
    })
}

impl FactExtractor for RegexExtractor {
    fn extract(&self, text: &str) -> Option<Extracted> {
        let m = object_re().find(text)?;
        let raw = m.as_str().to_string();
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(fields)) => {
                debug!(fields = fields.len(), "extracted structured payload");
                Some(Extracted { raw, fields })
            }
            Ok(_) => {
                warn!("matched payload is not a key/value object");
                None
            }
            Err(e) => {
                warn!("structured payload failed to parse: {e}");
                None
            }
        }
    }
}

// ── Merge ────────────────────────────────────────────────────────────────

/// Shallow override-merge: values in `new` win on key collision; keys only
/// in `existing` are preserved. `merge_facts(a, {})` is `a`.
pub fn merge_facts(existing: &Facts, new: &Facts) -> Facts {
    let mut merged = existing.clone();
    for (k, v) in new {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

// ── Reply cleaning ───────────────────────────────────────────────────────

/// Substituted when stripping the payload leaves no visible reply.
pub const COMPLETION_ACK: &str = "Thank you for sharing your story. I have all the \
information I need. Let me now research the relevant laws for your case.";

fn fence_remnant_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?\s*```").expect("static regex"))
}

/// Remove the matched payload text and any fenced-block remnants it left
/// behind from the visible reply.
pub fn strip_payload(content: &str, raw: &str) -> String {
    let cleaned = content.replace(raw, "");
    fence_remnant_re().replace_all(&cleaned, "").trim().to_string()
}

// ── Turn-level extraction + merge ────────────────────────────────────────

/// Outcome of reconciling a stage reply with the existing fact mapping.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub facts: Facts,
    /// Cleaned assistant-visible reply.
    pub reply: String,
    /// The case is complete: the merged payload declared it, or the
    /// turn-level completion signal fired.
    pub complete: bool,
}

/// Extract a structured payload from `content` and merge it over
/// `existing`. Extraction is additive-or-noop: a missing or malformed
/// payload never touches previously captured facts.
///
/// `signaled` is the turn-level completion signal. When the case is
/// complete — from either source — `status` is forced to `COMPLETE` in
/// the merged mapping regardless of what the model claimed, and the
/// payload is stripped from the reply (with a default acknowledgment if
/// nothing remains).
pub fn extract_and_merge(
    extractor: &dyn FactExtractor,
    existing: &Facts,
    content: &str,
    signaled: bool,
) -> MergeOutcome {
    let Some(found) = extractor.extract(content) else {
        return MergeOutcome {
            facts: existing.clone(),
            reply: content.to_string(),
            complete: false,
        };
    };

    let mut facts = merge_facts(existing, &found.fields);
    let declared_complete = facts
        .get(STATUS_KEY)
        .and_then(Value::as_str)
        .is_some_and(|s| s == STATUS_COMPLETE);
    let complete = declared_complete || signaled;

    let cleaned = strip_payload(content, &found.raw);

    if complete {
        facts.insert(STATUS_KEY.into(), Value::String(STATUS_COMPLETE.into()));
        let reply = if cleaned.is_empty() { COMPLETION_ACK.to_string() } else { cleaned };
        MergeOutcome { facts, reply, complete }
    } else {
        // In-progress: still strip the payload, but keep the raw reply if
        // the model sent nothing besides the object.
        let reply = if cleaned.is_empty() { content.to_string() } else { cleaned };
        MergeOutcome { facts, reply, complete }
    }
}

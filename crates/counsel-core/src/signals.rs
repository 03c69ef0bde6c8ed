use tracing::debug;

use crate::types::{ChatMessage, Role};

/// Explicit completion language. A match bypasses the exchange-count guard.
const STRONG_SIGNALS: &[&str] = &[
    "i'm done",
    "i am done",
    "that's everything",
    "that is everything",
    "that's all",
    "that is all",
    "nothing else",
    "no more information",
    "finished",
    "complete",
    "that covers it",
    "that covers everything",
];

/// Ambiguous completion words that also appear incidentally in ordinary
/// conversation; gated by conversation depth to reduce false positives.
const MODERATE_SIGNALS: &[&str] =
    &["done", "finish", "all the facts", "everything i know", "all i have"];

/// Minimum user turns before a moderate signal is trusted.
const MIN_USER_TURNS: usize = 3;

/// Has the user signaled they are finished providing facts?
///
/// Checks the most recent user-authored turn: a strong phrase always
/// counts; a moderate phrase counts only once the conversation has at
/// least [`MIN_USER_TURNS`] user turns.
pub fn detect_completion(messages: &[ChatMessage]) -> bool {
    let Some(last_user) = messages.iter().rev().find(|m| m.role == Role::User) else {
        return false;
    };
    let text = last_user.content.to_lowercase();

    if STRONG_SIGNALS.iter().any(|s| text.contains(s)) {
        debug!("strong completion signal detected");
        return true;
    }

    if MODERATE_SIGNALS.iter().any(|s| text.contains(s)) {
        let user_turns = messages.iter().filter(|m| m.role == Role::User).count();
        if user_turns >= MIN_USER_TURNS {
            debug!(user_turns, "moderate completion signal with sufficient context");
            return true;
        }
    }

    false
}

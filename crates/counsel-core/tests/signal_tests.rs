use counsel_core::signals::detect_completion;
use counsel_core::types::ChatMessage;

fn user(text: &str) -> ChatMessage {
    ChatMessage::user(text)
}

fn assistant(text: &str) -> ChatMessage {
    ChatMessage::assistant(text)
}

#[test]
fn test_empty_history_is_not_complete() {
    assert!(!detect_completion(&[]));
}

#[test]
fn test_assistant_only_history_is_not_complete() {
    let messages = vec![assistant("How can I help you today?")];
    assert!(!detect_completion(&messages));
}

#[test]
fn test_strong_signal_on_first_message() {
    // Strong phrases bypass the exchange-count guard entirely.
    let messages = vec![user("I'm done")];
    assert!(detect_completion(&messages));
}

#[test]
fn test_strong_signal_is_case_insensitive() {
    let messages = vec![user("THAT'S EVERYTHING")];
    assert!(detect_completion(&messages));
}

#[test]
fn test_strong_signal_embedded_in_longer_message() {
    let messages = vec![
        user("I was fired last month."),
        assistant("Tell me more."),
        user("My boss threatened me. That covers it, I think."),
    ];
    assert!(detect_completion(&messages));
}

#[test]
fn test_moderate_signal_below_threshold() {
    let messages = vec![
        user("I was fired from my job."),
        assistant("What happened?"),
        user("done"),
    ];
    // Only 2 user turns: "done" alone is not trusted yet.
    assert!(!detect_completion(&messages));
}

#[test]
fn test_moderate_signal_at_threshold() {
    let messages = vec![
        user("I was fired from my job."),
        assistant("What happened?"),
        user("My manager retaliated after I complained."),
        assistant("Anything else?"),
        user("done"),
    ];
    assert!(detect_completion(&messages));
}

#[test]
fn test_moderate_signal_checks_last_user_turn_only() {
    let messages = vec![
        user("done"),
        assistant("Could you tell me what happened first?"),
        user("I was fired."),
        assistant("Go on."),
        user("There were threats involved."),
    ];
    // Three user turns, but the latest one carries no signal.
    assert!(!detect_completion(&messages));
}

#[test]
fn test_ordinary_message_is_not_complete() {
    let messages = vec![
        user("I was fired from TechCorp."),
        assistant("I'm sorry to hear that."),
        user("It happened in October."),
    ];
    assert!(!detect_completion(&messages));
}

#[test]
fn test_phrase_all_the_facts_requires_depth() {
    let short = vec![user("that's all the facts")];
    // "that's all" is a strong phrase, so this one fires immediately.
    assert!(detect_completion(&short));

    let moderate_only = vec![user("you have all the facts now")];
    assert!(!detect_completion(&moderate_only));
}

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    agent::LlmBackend,
    extract::{extract_and_merge, merge_facts, FactExtractor},
    prefill::{is_context_turn, parse_system_context},
    router::NEXT_RESEARCHER,
    signals::detect_completion,
    stages::{INTAKE_COMPLETION_OVERRIDE, INTAKE_SYSTEM},
    types::{CaseState, ChatMessage, StageUpdate},
};

/// Intake stage: interview the user, extract facts, and decide whether the
/// case is ready for the research pass.
///
/// Provider-injected context turns seed the fact baseline before the
/// conversational extractor runs, and are filtered out of the history the
/// model sees.
pub async fn run_intake(
    llm: &dyn LlmBackend,
    extractor: &dyn FactExtractor,
    state: &CaseState,
) -> Result<StageUpdate> {
    let prefill = parse_system_context(&state.messages);
    let existing = if prefill.is_empty() {
        state.case_facts.clone()
    } else {
        info!(fields = prefill.len(), "pre-filled facts from context turn");
        merge_facts(&state.case_facts, &prefill)
    };

    let visible: Vec<ChatMessage> = state
        .messages
        .iter()
        .filter(|m| !is_context_turn(m))
        .cloned()
        .collect();

    let completing = detect_completion(&visible);

    let mut system_prompt = INTAKE_SYSTEM.to_string();
    if completing {
        info!("completion signal detected, forcing summary output");
        system_prompt.push_str(INTAKE_COMPLETION_OVERRIDE);
    }

    let content = llm
        .complete(&system_prompt, &visible)
        .await
        .context("intake model call")?;

    let outcome = extract_and_merge(extractor, &existing, &content, completing);

    let next_step = if outcome.complete {
        info!("intake complete, routing to research");
        Some(NEXT_RESEARCHER.to_string())
    } else {
        None
    };

    Ok(StageUpdate {
        reply: Some(outcome.reply),
        case_facts: Some(outcome.facts),
        next_step,
        ..Default::default()
    })
}

use anyhow::{Context, Result};
use base64::Engine;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    agent::{LlmBackend, SearchBackend},
    precedents,
    router::{NEXT_CRITIC, NEXT_END, NEXT_STRATEGIST, NEXT_WRITER},
    types::{CaseState, ChatMessage, Facts, StageUpdate},
};

// ── System prompts ───────────────────────────────────────────────────────

pub const INTAKE_SYSTEM: &str = "\
You are an empathetic legal intake specialist for an employment-law consultation \
service. Interview the user about their workplace grievance, one or two focused \
questions at a time. You must gather: client_name, opposing_party, incident_date, \
jurisdiction (state and country), and summary_of_facts.\n\
\n\
After every reply, append a JSON object with the facts gathered so far, for \
example: {\"status\": \"IN_PROGRESS\", \"client_name\": \"...\", \"jurisdiction\": \"...\"}.\n\
Set \"status\" to \"COMPLETE\" only when every required fact is captured and the \
user has nothing more to add; otherwise keep it \"IN_PROGRESS\".\n\
Never give legal advice during intake. Never mention the JSON object to the user.";

/// Appended when the completion detector fires, so the model stops asking
/// questions and emits the final summary this turn.
pub const INTAKE_COMPLETION_OVERRIDE: &str = "\n\n\
CRITICAL OVERRIDE: The user has indicated they are DONE providing information. \
You MUST now output the JSON summary immediately. Do NOT ask any more questions. \
Output the JSON block with all information you have gathered so far.";

const RESEARCH_SYSTEM: &str = "\
You are a legal research assistant. Write a focused research memo in markdown \
covering the statutes, regulations, and leading case law that apply to the case \
facts provided. Anchor every point to the stated jurisdiction. Use the supplied \
web search results where they are relevant; do not invent citations.";

const STRATEGY_SYSTEM: &str = "\
You are a senior litigation strategist. From the case facts and the research \
memo, draft a litigation strategy brief in markdown: claims to assert, the \
elements of each claim mapped to the known facts, evidentiary gaps, settlement \
posture, and recommended next actions for the client.";

const CRITIC_SYSTEM: &str = "\
You are opposing counsel. Attack the proposed strategy: identify the weakest \
claims, the defenses the employer will raise, missing evidence, procedural \
hurdles, and any statute-of-limitations risk. Be specific and adversarial; \
your counter-analysis is used to harden the strategy before anything is filed.";

const WRITER_SYSTEM: &str = "\
You are a professional legal writer. Produce polished, client-ready documents \
in plain markdown. Write formally but accessibly; the reader is the client, \
not a court.";

// ── Prompt assembly ──────────────────────────────────────────────────────

fn fact_str<'a>(facts: &'a Facts, key: &str) -> Option<&'a str> {
    facts.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Render facts as a block of `key: value` lines for stage prompts.
fn facts_block(facts: &Facts) -> String {
    let mut out = String::new();
    for (k, v) in facts {
        let rendered = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("- {k}: {rendered}\n"));
    }
    out
}

async fn complete_one(
    llm: &dyn LlmBackend,
    system: &str,
    prompt: String,
    what: &str,
) -> Result<String> {
    llm.complete(system, &[ChatMessage::user(prompt)])
        .await
        .with_context(|| format!("{what} model call"))
}

// ── Research ─────────────────────────────────────────────────────────────

/// Research stage: optional web search plus a model-written memo over the
/// case facts. A failing search degrades to a model-only memo; a failing
/// model call is a stage error.
pub async fn run_research(
    llm: &dyn LlmBackend,
    search: Option<&dyn SearchBackend>,
    state: &CaseState,
) -> Result<StageUpdate> {
    let case_type = fact_str(&state.case_facts, "case_type")
        .or_else(|| fact_str(&state.case_facts, "issue"))
        .unwrap_or("employment dispute");
    let jurisdiction = fact_str(&state.case_facts, "jurisdiction").unwrap_or("United States");

    let mut snippets = Vec::new();
    if let Some(search) = search {
        let query = format!("{case_type} law {jurisdiction} statutes remedies");
        match search.search(&query, 5).await {
            Ok(results) => {
                info!(results = results.len(), %query, "web search completed");
                snippets = results;
            }
            Err(e) => warn!("web search failed, continuing model-only: {e:#}"),
        }
    }

    let mut prompt = format!(
        "Case facts:\n{}\nJurisdiction: {jurisdiction}\nIssue: {case_type}\n",
        facts_block(&state.case_facts)
    );
    if !snippets.is_empty() {
        prompt.push_str("\nWeb search results:\n");
        for (i, s) in snippets.iter().enumerate() {
            prompt.push_str(&format!("[{}] {s}\n", i + 1));
        }
    }
    prompt.push_str("\nWrite the legal research memo.");

    let memo = complete_one(llm, RESEARCH_SYSTEM, prompt, "research").await?;

    Ok(StageUpdate {
        legal_research: Some(memo),
        next_step: Some(NEXT_STRATEGIST.into()),
        ..Default::default()
    })
}

// ── Strategy ─────────────────────────────────────────────────────────────

/// Strategy stage: facts + research memo + matched precedents → brief.
pub async fn run_strategy(llm: &dyn LlmBackend, state: &CaseState) -> Result<StageUpdate> {
    let research = state.legal_research.as_deref().unwrap_or("");
    let matched = precedents::find_relevant(&state.case_facts, 3);
    if !matched.is_empty() {
        info!(precedents = matched.len(), "matched precedents for strategy");
    }

    let mut prompt = format!(
        "Case facts:\n{}\nResearch memo:\n{research}\n",
        facts_block(&state.case_facts)
    );
    if !matched.is_empty() {
        prompt.push_str("\nPrecedents to consider citing:\n");
        for p in &matched {
            prompt.push_str(&format!("- {} — {}: {}\n", p.name, p.citation, p.summary));
        }
    }
    prompt.push_str("\nWrite the litigation strategy brief.");

    let mut brief = complete_one(llm, STRATEGY_SYSTEM, prompt, "strategy").await?;
    brief.push_str(&precedents::format_for_brief(&matched));

    Ok(StageUpdate {
        strategy_brief: Some(brief),
        next_step: Some(NEXT_CRITIC.into()),
        ..Default::default()
    })
}

// ── Critique ─────────────────────────────────────────────────────────────

/// Critique stage: adversarial counter-analysis of the strategy brief.
pub async fn run_critique(llm: &dyn LlmBackend, state: &CaseState) -> Result<StageUpdate> {
    let brief = state.strategy_brief.as_deref().unwrap_or("");
    let prompt = format!(
        "Case facts:\n{}\nProposed strategy:\n{brief}\n\nWrite your counter-analysis.",
        facts_block(&state.case_facts)
    );

    let feedback = complete_one(llm, CRITIC_SYSTEM, prompt, "critique").await?;

    Ok(StageUpdate {
        critic_feedback: Some(feedback),
        next_step: Some(NEXT_WRITER.into()),
        ..Default::default()
    })
}

// ── Writer ───────────────────────────────────────────────────────────────

pub const DOC_DEMAND_LETTER: &str = "demand_letter";
pub const DOC_REASONING_MEMO: &str = "reasoning_memo";

/// Writer stage: two client documents, base64-encoded and keyed by name.
pub async fn run_writer(llm: &dyn LlmBackend, state: &CaseState) -> Result<StageUpdate> {
    let facts = facts_block(&state.case_facts);
    let strategy = state.strategy_brief.as_deref().unwrap_or("");
    let critique = state.critic_feedback.as_deref().unwrap_or("");

    let letter_prompt = format!(
        "Case facts:\n{facts}\nStrategy brief:\n{strategy}\n\n\
         Draft a formal demand letter to the opposing party on the client's \
         behalf: the factual background, the legal claims, the remedy demanded, \
         and a response deadline.",
    );
    let letter = complete_one(llm, WRITER_SYSTEM, letter_prompt, "writer").await?;

    let memo_prompt = format!(
        "Case facts:\n{facts}\nStrategy brief:\n{strategy}\nOpposing analysis:\n{critique}\n\n\
         Draft a reasoning memo for the client explaining, in plain language, \
         the strengths and weaknesses of their case and why the demand letter \
         takes the position it does.",
    );
    let memo = complete_one(llm, WRITER_SYSTEM, memo_prompt, "writer").await?;

    let engine = base64::engine::general_purpose::STANDARD;
    let mut docs = Facts::new();
    docs.insert(DOC_DEMAND_LETTER.into(), Value::String(engine.encode(letter)));
    docs.insert(DOC_REASONING_MEMO.into(), Value::String(engine.encode(memo)));
    info!(docs = docs.len(), "generated client documents");

    Ok(StageUpdate {
        generated_docs: Some(docs),
        next_step: Some(NEXT_END.into()),
        ..Default::default()
    })
}

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use counsel_core::{
    agent::{LlmBackend, SearchBackend},
    extract::RegexExtractor,
    pipeline::{Pipeline, DEGRADED_REPLY},
    router::NEXT_END,
    types::{AgentRole, CaseState, ChatMessage, Role},
};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Replays a fixed queue of completions and records every call, so tests
/// can assert on what the model was shown. Errors once the script runs dry.
struct ScriptedBackend {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedBackend {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), messages.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("upstream model unavailable"))
    }
}

struct FailingSearch;

#[async_trait]
impl SearchBackend for FailingSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<String>> {
        Err(anyhow!("search quota exhausted"))
    }
}

fn pipeline_sharing(
    backend: &Arc<ScriptedBackend>,
    search: Option<Arc<dyn SearchBackend>>,
) -> Pipeline {
    let mut backends: HashMap<AgentRole, Arc<dyn LlmBackend>> = HashMap::new();
    for role in AgentRole::ALL {
        backends.insert(role, Arc::clone(backend) as Arc<dyn LlmBackend>);
    }
    Pipeline::new(backends, search, Arc::new(RegexExtractor))
}

fn state_with_user_turns(turns: &[&str]) -> CaseState {
    let mut state = CaseState::new(None);
    for (i, t) in turns.iter().enumerate() {
        if i > 0 {
            state.push(ChatMessage::assistant("Understood — go on."));
        }
        state.push(ChatMessage::user(*t));
    }
    state
}

// ── Intake-only turns ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_turn_halts_in_intake() {
    let backend = ScriptedBackend::new(&[
        r#"Thanks for reaching out. What is your name? {"status": "IN_PROGRESS", "summary_of_facts": "fired from TechCorp"}"#,
    ]);
    let pipeline = pipeline_sharing(&backend, None);

    let mut state = state_with_user_turns(&["I was fired from TechCorp last month."]);
    pipeline.run_turn(&mut state).await;

    assert!(state.error.is_none());
    assert_eq!(state.next_step, None);
    assert_eq!(state.case_facts["status"], "IN_PROGRESS");
    assert_eq!(state.case_facts["summary_of_facts"], "fired from TechCorp");
    assert!(state.legal_research.is_none());
    assert_eq!(state.iteration, 2);

    let reply = state.last_assistant_reply().unwrap_or("");
    assert!(reply.contains("What is your name?"));
    assert!(!reply.contains('{'));

    // Only the intake model was consulted.
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn test_context_turn_seeds_facts_and_is_hidden_from_model() {
    let backend = ScriptedBackend::new(&["Could you tell me what happened?"]);
    let pipeline = pipeline_sharing(&backend, None);

    let mut state = CaseState::new(None);
    state.push(ChatMessage::system_context(
        "System Context: User is located in Texas, USA. The legal issue is wrongful termination.",
    ));
    state.push(ChatMessage::user("I need help with a work issue."));
    pipeline.run_turn(&mut state).await;

    // Pre-filled baseline survives a reply with no payload at all.
    assert_eq!(state.case_facts["jurisdiction"], "Texas, USA");
    assert_eq!(state.case_facts["case_type"], "wrongful termination");

    // The tagged turn never reaches the model.
    let calls = backend.calls();
    let (_, shown) = &calls[0];
    assert!(shown.iter().all(|m| !m.content.starts_with("System Context:")));
    assert!(shown.iter().any(|m| m.role == Role::User));
}

#[tokio::test]
async fn test_completion_signal_forces_summary_instruction() {
    let backend = ScriptedBackend::new(&[
        r#"{"status": "COMPLETE", "client_name": "Maria Garcia"}"#,
        "research memo",
        "strategy brief",
        "critic notes",
        "demand letter",
        "reasoning memo",
    ]);
    let pipeline = pipeline_sharing(&backend, None);

    let mut state = state_with_user_turns(&[
        "I was fired after reporting safety violations.",
        "My name is Maria Garcia.",
        "That is everything. I'm done.",
    ]);
    pipeline.run_turn(&mut state).await;

    let calls = backend.calls();
    let (intake_system, _) = &calls[0];
    assert!(intake_system.contains("CRITICAL OVERRIDE"));
}

// ── Full pipeline pass ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_completed_intake_runs_single_pass_to_writer() {
    let backend = ScriptedBackend::new(&[
        r#"{"status": "COMPLETE", "client_name": "Maria Garcia", "opposing_party": "TechCorp",
            "jurisdiction": "California, USA",
            "summary_of_facts": "fired in retaliation for reporting OSHA violations, title vii concerns"}"#,
        "# Legal Research Memo\n\nCalifornia Labor Code 1102.5 applies.",
        "# Strategy\n\nAssert retaliation claims.",
        "# Counter-Analysis\n\nEmployer will argue performance.",
        "Dear TechCorp, ...",
        "Dear Ms. Garcia, ...",
    ]);
    let pipeline = pipeline_sharing(&backend, None);

    let mut state = state_with_user_turns(&[
        "I was fired after reporting safety violations at TechCorp.",
        "Maria Garcia. It happened in October 2024 in California.",
        "That is everything. I'm done.",
    ]);
    pipeline.run_turn(&mut state).await;

    assert!(state.error.is_none(), "unexpected error: {:?}", state.error);
    assert_eq!(state.case_facts["status"], "COMPLETE");
    assert!(state.legal_research.as_deref().unwrap().contains("Labor Code"));
    assert!(state.strategy_brief.is_some());
    assert!(state.critic_feedback.is_some());
    assert_eq!(state.next_step.as_deref(), Some(NEXT_END));

    // Retaliation facts pull in matching precedents.
    assert!(state
        .strategy_brief
        .as_deref()
        .unwrap()
        .contains("Relevant Legal Precedents"));

    // Both client documents, base64-encoded and decodable.
    let docs = state.generated_docs.as_ref().expect("docs");
    let engine = base64::engine::general_purpose::STANDARD;
    let letter = engine
        .decode(docs["demand_letter"].as_str().unwrap())
        .expect("valid base64");
    assert_eq!(String::from_utf8(letter).unwrap(), "Dear TechCorp, ...");
    assert!(docs.contains_key("reasoning_memo"));

    // Intake + research + strategy + critique + two writer calls.
    assert_eq!(backend.calls().len(), 6);
    assert_eq!(state.trace.len(), 5);
    assert!(state.trace.iter().all(|t| t.ends_with("ok")));
}

#[tokio::test]
async fn test_search_failure_degrades_to_model_only_research() {
    let backend = ScriptedBackend::new(&[
        r#"{"status": "COMPLETE", "case_type": "wrongful termination"}"#,
        "model-only memo",
        "brief",
        "critique",
        "letter",
        "memo",
    ]);
    let pipeline = pipeline_sharing(&backend, Some(Arc::new(FailingSearch)));

    let mut state = state_with_user_turns(&["I'm done"]);
    pipeline.run_turn(&mut state).await;

    assert!(state.error.is_none());
    assert_eq!(state.legal_research.as_deref(), Some("model-only memo"));
}

// ── Degraded turns ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stage_failure_is_stamped_not_propagated() {
    // Intake succeeds and declares completion; the research model then
    // fails (script exhausted).
    let backend = ScriptedBackend::new(&[
        r#"{"status": "COMPLETE", "client_name": "Jane"}"#,
    ]);
    let pipeline = pipeline_sharing(&backend, None);

    let mut state = state_with_user_turns(&["That is everything, I'm done."]);
    pipeline.run_turn(&mut state).await;

    assert!(state.error.is_some());
    assert_eq!(state.error_source.as_deref(), Some("research"));
    assert_eq!(state.last_assistant_reply(), Some(DEGRADED_REPLY));
    // Facts captured before the failure survive.
    assert_eq!(state.case_facts["client_name"], "Jane");
    assert!(state.legal_research.is_none());
}

#[tokio::test]
async fn test_intake_failure_keeps_turn_alive() {
    let backend = ScriptedBackend::new(&[]);
    let pipeline = pipeline_sharing(&backend, None);

    let mut state = state_with_user_turns(&["I was fired."]);
    let facts_before = state.case_facts.clone();
    pipeline.run_turn(&mut state).await;

    assert_eq!(state.error_source.as_deref(), Some("intake"));
    assert_eq!(state.last_assistant_reply(), Some(DEGRADED_REPLY));
    assert_eq!(state.case_facts, facts_before);
}

#[tokio::test]
async fn test_error_fields_are_cleared_on_next_turn() {
    let backend = ScriptedBackend::new(&[]);
    let pipeline = pipeline_sharing(&backend, None);

    let mut state = state_with_user_turns(&["hello"]);
    pipeline.run_turn(&mut state).await;
    assert!(state.error.is_some());

    // Next turn with a healthy script: the stale error is cleared first.
    let backend = ScriptedBackend::new(&["What happened next?"]);
    let pipeline = pipeline_sharing(&backend, None);
    state.push(ChatMessage::user("My boss threatened me."));
    pipeline.run_turn(&mut state).await;

    assert!(state.error.is_none());
    assert!(state.error_source.is_none());
}

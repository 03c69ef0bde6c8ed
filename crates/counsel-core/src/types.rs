use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Messages ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Provider-injected context turn; filtered from model-visible history.
    #[serde(rename = "system")]
    SystemContext,
}

impl Role {
    /// Lenient wire-format parse; unrecognized roles are treated as user
    /// turns so a sloppy client cannot crash a request.
    pub fn parse(s: &str) -> Role {
        match s {
            "assistant" | "ai" => Role::Assistant,
            "system" | "system_context" => Role::SystemContext,
            _ => Role::User,
        }
    }
}

/// The one canonical message type used across the pipeline.
/// Wire-format history is converted to this at the server boundary once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn system_context(content: impl Into<String>) -> Self {
        Self { role: Role::SystemContext, content: content.into() }
    }
}

// ── Facts ────────────────────────────────────────────────────────────────

/// Fact-key → value mapping extracted from the conversation. Unknown keys
/// pass through untouched.
pub type Facts = Map<String, Value>;

pub const STATUS_KEY: &str = "status";
pub const STATUS_COMPLETE: &str = "COMPLETE";
pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";

// ── Agent roles ──────────────────────────────────────────────────────────

/// The five model-backed roles in the pipeline. Each role gets its own
/// explicitly constructed client (model + temperature) at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Intake,
    Researcher,
    Strategist,
    Critic,
    Writer,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Intake,
        AgentRole::Researcher,
        AgentRole::Strategist,
        AgentRole::Critic,
        AgentRole::Writer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Intake => "intake",
            AgentRole::Researcher => "researcher",
            AgentRole::Strategist => "strategist",
            AgentRole::Critic => "critic",
            AgentRole::Writer => "writer",
        }
    }
}

// ── Case State ───────────────────────────────────────────────────────────

/// The single unit of truth threaded through every turn. Mutated in place
/// by exactly one stage at a time; persisted at the end of each turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseState {
    /// Chat history. Append-only within a turn; never reordered.
    pub messages: Vec<ChatMessage>,
    /// Facts gathered by intake. Once a key is populated it is never
    /// dropped by a merge unless overwritten by a newer value.
    #[serde(default)]
    pub case_facts: Facts,
    /// Routing directive declared by the last stage; `None` = halt and
    /// await the next user turn.
    #[serde(default)]
    pub next_step: Option<String>,

    // Stage outputs: each written once per pipeline run by its owner,
    // read-only to downstream stages.
    #[serde(default)]
    pub legal_research: Option<String>,
    #[serde(default)]
    pub strategy_brief: Option<String>,
    #[serde(default)]
    pub critic_feedback: Option<String>,
    /// Document name → base64-encoded content.
    #[serde(default)]
    pub generated_docs: Option<Facts>,

    /// User locale; immutable once the session exists.
    pub language: String,
    /// Turn counter, starts at 1.
    pub iteration: u32,
    /// Stage-by-stage execution notes for the current turn.
    #[serde(default)]
    pub trace: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_source: Option<String>,
}

pub const DEFAULT_LANGUAGE: &str = "en";

impl CaseState {
    pub fn new(language: Option<&str>) -> Self {
        Self {
            messages: Vec::new(),
            case_facts: Map::new(),
            next_step: None,
            legal_research: None,
            strategy_brief: None,
            critic_feedback: None,
            generated_docs: None,
            language: language
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string(),
            iteration: 1,
            trace: Vec::new(),
            session_id: None,
            error: None,
            error_source: None,
        }
    }

    pub fn push(&mut self, msg: ChatMessage) {
        self.messages.push(msg);
    }

    pub fn user_turn_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// Last assistant-visible reply, for the turn response.
    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

// ── Stage updates ────────────────────────────────────────────────────────

/// Partial update returned by a stage: only the fields the stage actually
/// produced. The orchestrator merges this into the full state; a stage
/// never replaces the state wholesale.
#[derive(Debug, Clone, Default)]
pub struct StageUpdate {
    /// Assistant-visible reply to append to the history.
    pub reply: Option<String>,
    pub case_facts: Option<Facts>,
    pub next_step: Option<String>,
    pub legal_research: Option<String>,
    pub strategy_brief: Option<String>,
    pub critic_feedback: Option<String>,
    pub generated_docs: Option<Facts>,
}

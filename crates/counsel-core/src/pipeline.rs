use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::{
    agent::{LlmBackend, SearchBackend},
    extract::FactExtractor,
    intake,
    router::Stage,
    stages,
    types::{AgentRole, CaseState, ChatMessage, StageUpdate},
};

/// Assistant-visible reply substituted when a stage fails. The turn still
/// returns a success-shaped response; the failure is carried in the
/// `error` fields.
pub const DEGRADED_REPLY: &str = "I ran into a problem while working on your case just \
now. Everything you have told me is saved — please send your message again in a moment.";

/// Sequences stage invocations for one user turn. Backends are injected
/// per role at construction; there is no global client state.
pub struct Pipeline {
    backends: HashMap<AgentRole, Arc<dyn LlmBackend>>,
    search: Option<Arc<dyn SearchBackend>>,
    extractor: Arc<dyn FactExtractor>,
}

impl Pipeline {
    pub fn new(
        backends: HashMap<AgentRole, Arc<dyn LlmBackend>>,
        search: Option<Arc<dyn SearchBackend>>,
        extractor: Arc<dyn FactExtractor>,
    ) -> Self {
        Self { backends, search, extractor }
    }

    fn backend(&self, role: AgentRole) -> Result<&Arc<dyn LlmBackend>> {
        self.backends
            .get(&role)
            .ok_or_else(|| anyhow!("no backend configured for role {}", role.as_str()))
    }

    /// Process one user turn start-to-finish: run the current stage, merge
    /// its partial update, and advance per the router until halted.
    ///
    /// Never returns an error — a failing stage is caught here, stamped
    /// onto the state, and surfaced as a degraded reply.
    pub async fn run_turn(&self, state: &mut CaseState) {
        state.error = None;
        state.error_source = None;
        state.next_step = None;
        state.trace.clear();

        let mut stage = Stage::Intake;
        while !stage.is_terminal() {
            info!(stage = stage.as_str(), iteration = state.iteration, "running stage");

            match self.run_stage(stage, state).await {
                Ok(update) => {
                    validate_update(stage, &update);
                    apply_update(state, update);
                    state.trace.push(format!("{}: ok", stage.as_str()));
                }
                Err(e) => {
                    warn!(stage = stage.as_str(), "stage failed: {e:#}");
                    state.error = Some(format!("{e:#}"));
                    state.error_source = Some(stage.as_str().to_string());
                    state.trace.push(format!("{}: error", stage.as_str()));
                    state.push(ChatMessage::assistant(DEGRADED_REPLY));
                    break;
                }
            }

            stage = stage.next(state.next_step.as_deref());
        }

        state.iteration += 1;
    }

    async fn run_stage(&self, stage: Stage, state: &CaseState) -> Result<StageUpdate> {
        match stage {
            Stage::Intake => {
                intake::run_intake(
                    self.backend(AgentRole::Intake)?.as_ref(),
                    self.extractor.as_ref(),
                    state,
                )
                .await
            }
            Stage::Research => {
                stages::run_research(
                    self.backend(AgentRole::Researcher)?.as_ref(),
                    self.search.as_deref(),
                    state,
                )
                .await
            }
            Stage::Strategy => {
                stages::run_strategy(self.backend(AgentRole::Strategist)?.as_ref(), state).await
            }
            Stage::Critique => {
                stages::run_critique(self.backend(AgentRole::Critic)?.as_ref(), state).await
            }
            Stage::Writer => {
                stages::run_writer(self.backend(AgentRole::Writer)?.as_ref(), state).await
            }
            Stage::Halted => Ok(StageUpdate::default()),
        }
    }
}

/// Warn when a stage produced a field it does not own. The update is still
/// applied — ownership violations are a programming smell, not a reason to
/// drop a turn's work.
fn validate_update(stage: Stage, update: &StageUpdate) {
    let foreign = match stage {
        Stage::Intake => {
            update.legal_research.is_some()
                || update.strategy_brief.is_some()
                || update.critic_feedback.is_some()
                || update.generated_docs.is_some()
        }
        Stage::Research => {
            update.case_facts.is_some()
                || update.strategy_brief.is_some()
                || update.critic_feedback.is_some()
                || update.generated_docs.is_some()
        }
        Stage::Strategy => {
            update.case_facts.is_some()
                || update.legal_research.is_some()
                || update.critic_feedback.is_some()
                || update.generated_docs.is_some()
        }
        Stage::Critique => {
            update.case_facts.is_some()
                || update.legal_research.is_some()
                || update.strategy_brief.is_some()
                || update.generated_docs.is_some()
        }
        Stage::Writer => {
            update.case_facts.is_some()
                || update.legal_research.is_some()
                || update.strategy_brief.is_some()
                || update.critic_feedback.is_some()
        }
        Stage::Halted => false,
    };
    if foreign {
        warn!(stage = stage.as_str(), "stage produced fields outside its contract");
    }
}

/// Merge a partial update into the state. Only fields the stage produced
/// are touched; everything else is preserved.
fn apply_update(state: &mut CaseState, update: StageUpdate) {
    if let Some(reply) = update.reply {
        if !reply.is_empty() {
            state.push(ChatMessage::assistant(reply));
        }
    }
    if let Some(facts) = update.case_facts {
        state.case_facts = facts;
    }
    if update.legal_research.is_some() {
        state.legal_research = update.legal_research;
    }
    if update.strategy_brief.is_some() {
        state.strategy_brief = update.strategy_brief;
    }
    if update.critic_feedback.is_some() {
        state.critic_feedback = update.critic_feedback;
    }
    if update.generated_docs.is_some() {
        state.generated_docs = update.generated_docs;
    }
    state.next_step = update.next_step;
}

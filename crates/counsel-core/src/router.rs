use serde::{Deserialize, Serialize};

// ── Routing directives ───────────────────────────────────────────────────

/// Directive values a stage may declare in `next_step`.
pub const NEXT_RESEARCHER: &str = "researcher";
pub const NEXT_STRATEGIST: &str = "strategist";
pub const NEXT_CRITIC: &str = "critic";
pub const NEXT_WRITER: &str = "writer";
pub const NEXT_END: &str = "end";

// ── Stage state machine ──────────────────────────────────────────────────

/// Pipeline stages. A turn always starts in `Intake`; `Halted` means wait
/// for the next user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Intake,
    Research,
    Strategy,
    Critique,
    Writer,
    Halted,
}

impl Stage {
    /// Next stage after `self`, given the declared routing directive.
    ///
    /// Only intake branches: a recognized directive advances into the
    /// pipeline, anything else halts. Past intake the edges are fixed and
    /// the pipeline runs to completion in a single pass.
    pub fn next(self, directive: Option<&str>) -> Stage {
        match self {
            Stage::Intake => match directive {
                Some(NEXT_RESEARCHER) => Stage::Research,
                _ => Stage::Halted,
            },
            Stage::Research => Stage::Strategy,
            Stage::Strategy => Stage::Critique,
            Stage::Critique => Stage::Writer,
            Stage::Writer | Stage::Halted => Stage::Halted,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Halted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Research => "research",
            Stage::Strategy => "strategy",
            Stage::Critique => "critique",
            Stage::Writer => "writer",
            Stage::Halted => "halted",
        }
    }
}

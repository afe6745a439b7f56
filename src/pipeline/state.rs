use serde::Serialize;

/// Where a session is in its current cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    AwaitingInput,
    Resolving,
    ResolutionFailed,
    Filtering,
    Aggregated,
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Stage::AwaitingInput => "AwaitingInput",
            Stage::Resolving => "Resolving",
            Stage::ResolutionFailed => "ResolutionFailed",
            Stage::Filtering => "Filtering",
            Stage::Aggregated => "Aggregated",
        }
    }

    /// Legal edges of the state machine. Any stage may restart at
    /// `Resolving` (new file) or fall back to `AwaitingInput` (unreadable
    /// file); `Filtering` is re-entered from `Aggregated`.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (_, Resolving) | (_, AwaitingInput) => true,
            (Resolving, ResolutionFailed) | (Resolving, Filtering) => true,
            (Aggregated, Filtering) => true,
            (Filtering, Aggregated) => true,
            _ => false,
        }
    }
}

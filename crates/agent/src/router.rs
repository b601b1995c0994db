//! The decision function: given the current state, choose the next action.

use docsage_core::{Action, AgentLimits, AgentState};

use crate::safety::{SafetyGuard, StopReason, Verdict};

/// A guard intervention attached to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stop {
    pub reason: StopReason,
    /// The action the state machine would have chosen
    pub vetoed: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub stop: Option<Stop>,
}

impl Decision {
    fn plain(action: Action) -> Self {
        Self { action, stop: None }
    }
}

pub struct Router;

impl Router {
    /// Pure: identical state and limits always yield the same decision.
    pub fn decide(state: &AgentState, limits: &AgentLimits) -> Decision {
        let proposed = Self::propose(state, limits);
        if proposed == Action::End {
            return Decision::plain(Action::End);
        }

        if let Verdict::ForceStop(reason) = SafetyGuard::check(state, limits) {
            return Decision {
                action: Action::End,
                stop: Some(Stop {
                    reason,
                    vetoed: proposed,
                }),
            };
        }

        if proposed == Action::Retrieve {
            if let Verdict::ForceStop(reason) = SafetyGuard::check_retrieve(state, limits) {
                return Decision {
                    action: Action::Respond,
                    stop: Some(Stop {
                        reason,
                        vetoed: Action::Retrieve,
                    }),
                };
            }
        }

        Decision::plain(proposed)
    }

    /// The state machine before the guard is consulted.
    fn propose(state: &AgentState, limits: &AgentLimits) -> Action {
        if state.is_declined() || state.generation_failed {
            return Action::End;
        }

        let Some(skip_retrieval) = state.skip_retrieval else {
            return Action::Assess;
        };

        match &state.answer {
            None if skip_retrieval => Action::Respond,
            None if !state.has_context() => Action::Retrieve,
            None => Action::Respond,
            Some(_) if !state.quality_evaluated => Action::Reflect,
            Some(_) if state.needs_refinement && state.quality_attempts < limits.max_quality_attempts => {
                Action::Reflect
            }
            Some(_) => Action::End,
        }
    }
}

//! Termination rails for the control loop.
//!
//! The guard is a pure function over [`AgentState`]: it reads the node
//! history and the three counters and never mutates anything.

use docsage_core::{Action, AgentLimits, AgentState};
use std::fmt;

/// Why the guard intervened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `total_iterations` reached its ceiling
    IterationsExhausted,
    /// The last `loop_window` visits were all this action
    LoopDetected(Action),
    /// No retrieval attempts left and the context is still not sufficient
    RetrievalExhausted,
}

impl StopReason {
    /// Whether the run must end. `RetrievalExhausted` only vetoes RETRIEVE.
    pub fn forces_end(self) -> bool {
        !matches!(self, Self::RetrievalExhausted)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterationsExhausted => f.write_str("iterations_exhausted"),
            Self::LoopDetected(action) => write!(f, "loop_detected:{action}"),
            Self::RetrievalExhausted => f.write_str("retrieval_exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    ForceStop(StopReason),
}

pub struct SafetyGuard;

impl SafetyGuard {
    /// Run-level check applied before any non-END action.
    pub fn check(state: &AgentState, limits: &AgentLimits) -> Verdict {
        if state.total_iterations >= limits.max_total_iterations {
            return Verdict::ForceStop(StopReason::IterationsExhausted);
        }
        if let Some(action) = Self::repeated_action(state, limits.loop_window) {
            return Verdict::ForceStop(StopReason::LoopDetected(action));
        }
        Verdict::Continue
    }

    /// Additional check for RETRIEVE.
    pub fn check_retrieve(state: &AgentState, limits: &AgentLimits) -> Verdict {
        if state.retrieval_attempts >= limits.max_retrieval_attempts
            && state.context_is_sufficient != Some(true)
        {
            return Verdict::ForceStop(StopReason::RetrievalExhausted);
        }
        Verdict::Continue
    }

    /// Consulted inside the retrieval loop before every fetch.
    pub fn may_retry_retrieval(state: &AgentState, limits: &AgentLimits) -> bool {
        state.retrieval_attempts < limits.max_retrieval_attempts
    }

    fn repeated_action(state: &AgentState, window: usize) -> Option<Action> {
        if window == 0 || state.node_history.len() < window {
            return None;
        }
        let mut recent = state.recent_actions(window);
        let first = recent.next()?;
        recent.all(|a| a == first).then_some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsage_core::RetrievalMode;

    fn state_with(actions: &[Action]) -> AgentState {
        let mut state = AgentState::new("q", RetrievalMode::Local);
        for action in actions {
            state.record_visit(*action);
        }
        state
    }

    #[test]
    fn fresh_state_continues() {
        let state = AgentState::new("q", RetrievalMode::Local);
        assert_eq!(SafetyGuard::check(&state, &AgentLimits::default()), Verdict::Continue);
    }

    #[test]
    fn iteration_ceiling_stops() {
        let limits = AgentLimits {
            loop_window: 10,
            ..AgentLimits::default()
        };
        let state = state_with(&[
            Action::Retrieve,
            Action::Respond,
            Action::Reflect,
            Action::Respond,
            Action::Reflect,
        ]);
        assert_eq!(
            SafetyGuard::check(&state, &limits),
            Verdict::ForceStop(StopReason::IterationsExhausted)
        );
    }

    #[test]
    fn three_identical_actions_are_a_loop() {
        let state = state_with(&[Action::Reflect, Action::Reflect, Action::Reflect]);
        assert_eq!(
            SafetyGuard::check(&state, &AgentLimits::default()),
            Verdict::ForceStop(StopReason::LoopDetected(Action::Reflect))
        );

        let broken = state_with(&[Action::Reflect, Action::Respond, Action::Reflect]);
        assert_eq!(SafetyGuard::check(&broken, &AgentLimits::default()), Verdict::Continue);
    }

    #[test]
    fn retrieval_exhaustion_needs_insufficient_context() {
        let limits = AgentLimits::default();
        let mut state = AgentState::new("q", RetrievalMode::Web);
        state.retrieval_attempts = 3;
        state.context_is_sufficient = Some(false);
        assert_eq!(
            SafetyGuard::check_retrieve(&state, &limits),
            Verdict::ForceStop(StopReason::RetrievalExhausted)
        );
        assert!(!SafetyGuard::may_retry_retrieval(&state, &limits));

        state.context_is_sufficient = Some(true);
        assert_eq!(SafetyGuard::check_retrieve(&state, &limits), Verdict::Continue);
    }

    #[test]
    fn reason_strings_are_distinct() {
        assert_eq!(StopReason::IterationsExhausted.to_string(), "iterations_exhausted");
        assert_eq!(
            StopReason::LoopDetected(Action::Retrieve).to_string(),
            "loop_detected:RETRIEVE"
        );
        assert_eq!(StopReason::RetrievalExhausted.to_string(), "retrieval_exhausted");
        assert!(!StopReason::RetrievalExhausted.forces_end());
    }
}

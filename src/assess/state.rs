//! Assessment phase state machine.

use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Position in the interview: the 1-based number of the question currently
/// awaiting an answer.
///
/// Only [`InterviewScript`](super::script::InterviewScript) hands these out,
/// so an index past the end of the script cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct QuestionIndex(NonZeroUsize);

impl QuestionIndex {
    pub(super) const FIRST: Self = Self(NonZeroUsize::MIN);

    pub(super) fn new(number: usize) -> Option<Self> {
        NonZeroUsize::new(number).map(Self)
    }

    /// 1-based question number.
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// 0-based offset into the script.
    pub fn offset(self) -> usize {
        self.0.get() - 1
    }
}

/// The phases of an assessment session.
///
/// Progresses: AwaitingRepoContext → Asking(1..=N) → Analyzing → Chatting.
/// Error is reachable from AwaitingRepoContext (repository lookup failed) and
/// from Analyzing when chat after a failed assessment is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "question", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    AwaitingRepoContext,
    Asking(QuestionIndex),
    Analyzing,
    Chatting,
    Error,
}

impl Phase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Phase) -> bool {
        use Phase::*;
        match (self, target) {
            (AwaitingRepoContext, Asking(q)) => q.get() == 1,
            (Asking(from), Asking(to)) => to.get() == from.get() + 1,
            (AwaitingRepoContext, Error)
            | (Asking(_), Analyzing)
            | (Analyzing, Chatting)
            | (Analyzing, Error) => true,
            _ => false,
        }
    }

    /// Whether user submissions are routed anywhere in this phase.
    pub fn accepts_input(&self) -> bool {
        matches!(self, Self::Asking(_) | Self::Chatting)
    }

    /// Whether the session can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingRepoContext => write!(f, "awaiting_repo_context"),
            Self::Asking(q) => write!(f, "asking({})", q.get()),
            Self::Analyzing => write!(f, "analyzing"),
            Self::Chatting => write!(f, "chatting"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A recorded phase change.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: usize) -> QuestionIndex {
        QuestionIndex::new(n).unwrap()
    }

    #[test]
    fn valid_transitions() {
        use Phase::*;
        let transitions = [
            (AwaitingRepoContext, Asking(q(1))),
            (AwaitingRepoContext, Error),
            (Asking(q(1)), Asking(q(2))),
            (Asking(q(2)), Asking(q(3))),
            (Asking(q(3)), Analyzing),
            (Analyzing, Chatting),
            (Analyzing, Error),
        ];
        for (from, to) in transitions {
            assert!(
                from.can_transition_to(to),
                "{from} should transition to {to}"
            );
        }
    }

    #[test]
    fn invalid_transitions() {
        use Phase::*;
        // Skip questions
        assert!(!AwaitingRepoContext.can_transition_to(Asking(q(2))));
        assert!(!Asking(q(1)).can_transition_to(Asking(q(3))));
        // Go backward
        assert!(!Analyzing.can_transition_to(Asking(q(1))));
        assert!(!Chatting.can_transition_to(Asking(q(1))));
        assert!(!Chatting.can_transition_to(Analyzing));
        // Skip analysis
        assert!(!Asking(q(3)).can_transition_to(Chatting));
        // Terminal
        assert!(!Error.can_transition_to(Chatting));
        // Self-transition
        assert!(!Analyzing.can_transition_to(Analyzing));
        assert!(!Asking(q(2)).can_transition_to(Asking(q(2))));
    }

    #[test]
    fn input_only_in_asking_and_chatting() {
        use Phase::*;
        assert!(Asking(q(1)).accepts_input());
        assert!(Chatting.accepts_input());
        assert!(!AwaitingRepoContext.accepts_input());
        assert!(!Analyzing.accepts_input());
        assert!(!Error.accepts_input());
        assert!(Error.is_terminal());
        assert!(!Chatting.is_terminal());
    }

    #[test]
    fn question_index_offsets() {
        assert!(QuestionIndex::new(0).is_none());
        assert_eq!(q(1).offset(), 0);
        assert_eq!(q(3).get(), 3);
    }

    #[test]
    fn phase_serializes_with_question_number() {
        let json = serde_json::to_value(Phase::Asking(q(2))).unwrap();
        assert_eq!(json, serde_json::json!({"phase": "asking", "question": 2}));
        let json = serde_json::to_value(Phase::Chatting).unwrap();
        assert_eq!(json, serde_json::json!({"phase": "chatting"}));
    }

    #[test]
    fn display_names() {
        assert_eq!(Phase::default().to_string(), "awaiting_repo_context");
        assert_eq!(Phase::Asking(q(2)).to_string(), "asking(2)");
    }
}

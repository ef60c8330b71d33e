//! Assessment system: guided interview followed by free-form chat.
//!
//! A session greets the user, looks up the chosen repository, asks a short
//! scripted interview, requests an AI assessment built from the answers, and
//! then opens an unscripted chat about the repository. The orchestrator owns
//! every piece of conversation state; callers interact through
//! [`AssessmentSession`].

pub mod model;
pub mod orchestrator;
pub mod script;
pub mod state;

pub use model::{
    AnswerKey, Answers, ConversationEntry, RepoContext, RepoIdentity, RepoMetadata, Role,
    SessionInputs, SkillSet,
};
pub use orchestrator::{AssessmentSession, ConversationView};
pub use script::{InterviewScript, ScriptedQuestion};
pub use state::{Phase, PhaseTransition, QuestionIndex};

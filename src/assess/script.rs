//! Interview script and the fixed assistant messages of a session.

use std::collections::HashSet;

use super::model::{AnswerKey, RepoIdentity};
use super::state::QuestionIndex;
use crate::error::ConfigError;

pub const ANALYZING_NOTICE: &str = "Thanks for sharing! I'm analyzing this repository to provide personalized recommendations based on your answers...";

pub const KEEP_CHATTING_NOTICE: &str =
    "You can now continue chatting with me about anything related to this repository.";

pub const ASSESSMENT_APOLOGY: &str = "Sorry, I encountered an error while analyzing this repository. Please try again later.";

pub const CHAT_APOLOGY: &str =
    "Sorry, I encountered an error while processing your message. Please try again later.";

pub const REPO_INFO_ERROR: &str = "Failed to fetch repository information";

/// Greeting delivered as soon as a session starts.
pub fn welcome_message(repo: &RepoIdentity) -> String {
    format!(
        "Hi there! I'll help you assess if \"{}\" is a good fit for your skills. Let's chat about your interests and experience first.",
        repo.name
    )
}

/// A single scripted prompt and the answer slot it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedQuestion {
    pub prompt: String,
    pub key: AnswerKey,
}

impl ScriptedQuestion {
    pub fn new(prompt: impl Into<String>, key: AnswerKey) -> Self {
        Self {
            prompt: prompt.into(),
            key,
        }
    }
}

/// Ordered questions asked before free-form chat opens.
#[derive(Debug, Clone)]
pub struct InterviewScript {
    questions: Vec<ScriptedQuestion>,
}

impl Default for InterviewScript {
    fn default() -> Self {
        Self {
            questions: vec![
                ScriptedQuestion::new(
                    "What's your experience level with this technology?",
                    AnswerKey::Experience,
                ),
                ScriptedQuestion::new(
                    "What specific areas of this project interest you most?",
                    AnswerKey::Interests,
                ),
                ScriptedQuestion::new(
                    "How much time can you dedicate to contributing?",
                    AnswerKey::Time,
                ),
            ],
        }
    }
}

impl InterviewScript {
    /// Build a script. It must be non-empty and fill each answer slot at most once.
    pub fn new(questions: Vec<ScriptedQuestion>) -> Result<Self, ConfigError> {
        if questions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "interview_script".into(),
                message: "at least one question is required".into(),
            });
        }
        let mut seen = HashSet::new();
        for question in &questions {
            if !seen.insert(question.key) {
                return Err(ConfigError::InvalidValue {
                    key: "interview_script".into(),
                    message: format!("answer slot {} is used twice", question.key),
                });
            }
        }
        Ok(Self { questions })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Index of the opening question.
    pub fn first(&self) -> QuestionIndex {
        QuestionIndex::FIRST
    }

    /// The question after `index`, or `None` once the script is exhausted.
    pub fn next(&self, index: QuestionIndex) -> Option<QuestionIndex> {
        let next = index.get() + 1;
        if next > self.questions.len() {
            return None;
        }
        QuestionIndex::new(next)
    }

    pub fn question(&self, index: QuestionIndex) -> &ScriptedQuestion {
        &self.questions[index.offset()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptedQuestion> {
        self.questions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script_fills_slots_in_order() {
        let script = InterviewScript::default();
        let keys: Vec<AnswerKey> = script.iter().map(|q| q.key).collect();
        assert_eq!(keys, AnswerKey::ALL);
    }

    #[test]
    fn next_walks_and_stops_at_end() {
        let script = InterviewScript::default();
        let mut index = script.first();
        let mut seen = vec![script.question(index).key];
        while let Some(next) = script.next(index) {
            index = next;
            seen.push(script.question(index).key);
        }
        assert_eq!(index.get(), 3);
        assert_eq!(seen, AnswerKey::ALL);
    }

    #[test]
    fn rejects_empty_script() {
        assert!(InterviewScript::new(vec![]).is_err());
    }

    #[test]
    fn rejects_duplicate_slot() {
        let err = InterviewScript::new(vec![
            ScriptedQuestion::new("a", AnswerKey::Time),
            ScriptedQuestion::new("b", AnswerKey::Time),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("time"));
    }

    #[test]
    fn single_question_script_has_no_next() {
        let script =
            InterviewScript::new(vec![ScriptedQuestion::new("Why?", AnswerKey::Interests)])
                .unwrap();
        assert!(script.next(script.first()).is_none());
    }

    #[test]
    fn welcome_names_repository() {
        let msg = welcome_message(&RepoIdentity::new("tokio", "tokio-rs"));
        assert!(msg.contains("\"tokio\""));
    }
}

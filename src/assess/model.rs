//! Conversation, answer and repository data models.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Who authored a conversation entry.
///
/// Serialized as `"ai"` / `"user"`, which is what the chat backend expects
/// inside the resent history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ai")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

/// One committed message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    #[serde(rename = "type")]
    pub role: Role,
    pub text: String,
}

impl ConversationEntry {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// The fixed slots an interview answer can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKey {
    Experience,
    Interests,
    Time,
}

impl AnswerKey {
    /// All keys in interview order.
    pub const ALL: [AnswerKey; 3] = [Self::Experience, Self::Interests, Self::Time];
}

impl std::fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Experience => "experience",
            Self::Interests => "interests",
            Self::Time => "time",
        };
        write!(f, "{s}")
    }
}

/// Answers captured during the interview. Each slot is written at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl Answers {
    pub fn get(&self, key: AnswerKey) -> Option<&str> {
        match key {
            AnswerKey::Experience => self.experience.as_deref(),
            AnswerKey::Interests => self.interests.as_deref(),
            AnswerKey::Time => self.time.as_deref(),
        }
    }

    /// Store an answer. Returns false (and keeps the earlier answer) if the
    /// slot was already filled.
    pub fn record(&mut self, key: AnswerKey, answer: impl Into<String>) -> bool {
        let slot = match key {
            AnswerKey::Experience => &mut self.experience,
            AnswerKey::Interests => &mut self.interests,
            AnswerKey::Time => &mut self.time,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(answer.into());
        true
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        AnswerKey::ALL
            .iter()
            .filter(|key| self.get(**key).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The repository the user picked on the results screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIdentity {
    #[serde(rename = "repo")]
    pub name: String,
    pub owner: String,
}

impl RepoIdentity {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }

    /// `owner/name`, the way GitHub spells it.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Repository details returned by `/get_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "unknown_language")]
    pub language: String,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub forks: u64,
    #[serde(default)]
    pub issues: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_disabled: Option<bool>,
}

fn unknown_language() -> String {
    "Unknown".to_string()
}

/// Identity plus whatever metadata the backend has supplied so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoContext {
    pub identity: RepoIdentity,
    pub metadata: Option<RepoMetadata>,
}

impl RepoContext {
    pub fn new(identity: RepoIdentity) -> Self {
        Self {
            identity,
            metadata: None,
        }
    }

    /// Description from the metadata, or empty when unknown.
    pub fn description(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.description.as_deref())
            .unwrap_or("")
    }
}

/// The skills chosen on the skills screen. Non-empty once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillSet(Vec<String>);

impl SkillSet {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Selection persisted by earlier screens. Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInputs {
    #[serde(default, rename = "selectedSkills")]
    pub skills: Option<Vec<String>>,
    #[serde(default, rename = "currentRepo")]
    pub repo: Option<RepoIdentity>,
}

impl SessionInputs {
    pub fn new(skills: Vec<String>, repo: RepoIdentity) -> Self {
        Self {
            skills: Some(skills),
            repo: Some(repo),
        }
    }

    /// Check that both inputs are present before a session starts.
    pub fn validate(self) -> Result<(RepoIdentity, SkillSet), SessionError> {
        let repo = self
            .repo
            .filter(|r| !r.name.trim().is_empty())
            .ok_or(SessionError::NoRepositorySelected)?;
        let skills: Vec<String> = self
            .skills
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if skills.is_empty() {
            return Err(SessionError::NoSkillsSelected);
        }
        Ok((repo, SkillSet(skills)))
    }
}

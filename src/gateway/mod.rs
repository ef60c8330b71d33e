//! Backend gateway: the three remote operations an assessment needs.
//!
//! Every operation is a single request/response. Failures of any kind
//! (transport, non-success status, undecodable body) surface as one
//! [`GatewayError`]. Nothing here retries.

pub mod http;

pub use http::{HttpGateway, RepositorySummary};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::assess::model::{Answers, ConversationEntry, RepoMetadata, SkillSet};
use crate::error::GatewayError;

/// Body of `POST /get_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfoRequest {
    pub repo_name: String,
    pub owner: String,
}

/// Body of `POST /get_ai_recs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub skills: Vec<String>,
    pub repo_name: String,
    pub repo_desc: String,
    pub user_experience: String,
    pub user_interests: String,
    pub user_time: String,
}

impl AssessmentRequest {
    pub fn new(
        skills: &SkillSet,
        repo_name: &str,
        repo_description: &str,
        answers: &Answers,
    ) -> Self {
        Self {
            skills: skills.to_vec(),
            repo_name: repo_name.to_string(),
            repo_desc: repo_description.to_string(),
            user_experience: answers.experience.clone().unwrap_or_default(),
            user_interests: answers.interests.clone().unwrap_or_default(),
            user_time: answers.time.clone().unwrap_or_default(),
        }
    }
}

/// Body of `POST /ai_chat`. The whole history is resent every time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub history: Vec<ConversationEntry>,
    pub prompt: String,
    pub repo_name: String,
    pub repo_info: Option<RepoMetadata>,
    pub skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssessmentResponse {
    pub ai_suggestions: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub response: String,
}

/// Remote operations used by the orchestrator.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Look up repository metadata.
    async fn fetch_repo_info(&self, repo_name: &str, owner: &str)
    -> Result<RepoMetadata, GatewayError>;

    /// Ask for the initial fit assessment. Returns the assessment text.
    async fn fetch_assessment(&self, request: &AssessmentRequest) -> Result<String, GatewayError>;

    /// Continue the free-form chat. Returns the assistant's reply.
    async fn continue_chat(&self, request: &ChatRequest) -> Result<String, GatewayError>;
}

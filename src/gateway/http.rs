//! HTTP gateway: JSON over `reqwest` against the PRism backend.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    AssessmentRequest, AssessmentResponse, ChatRequest, ChatResponse, Gateway, RepoInfoRequest,
};
use crate::assess::model::{RepoIdentity, RepoMetadata};
use crate::config::AssessConfig;
use crate::error::{ConfigError, GatewayError, GatewayOperation};

/// Longest backend error body quoted in a [`GatewayError`].
const MAX_ERROR_BODY_CHARS: usize = 200;

/// One search hit from `POST /repositories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub repo: String,
    pub owner: String,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub issues: u64,
    #[serde(default)]
    pub is_fork: bool,
}

impl RepositorySummary {
    pub fn identity(&self) -> RepoIdentity {
        RepoIdentity::new(&self.repo, &self.owner)
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    skills: &'a [String],
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Gateway backed by the PRism HTTP API.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: &AssessConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search repositories matching any of the given skills.
    pub async fn search_repositories(
        &self,
        skills: &[String],
    ) -> Result<Vec<RepositorySummary>, GatewayError> {
        self.post_json(
            GatewayOperation::Search,
            "/repositories",
            &SearchRequest { skills },
        )
        .await
    }

    async fn post_json<B, R>(
        &self,
        operation: GatewayOperation,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%operation, %url, "Backend request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::new(operation, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::new(
                operation,
                format!("status {}: {}", status, error_detail(&text)),
            ));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| GatewayError::new(operation, format!("invalid response body: {e}")))
    }
}

/// Prefer the backend's `{"error": "..."}` message, else a clipped raw body.
fn error_detail(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let clipped: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{clipped}...")
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn fetch_repo_info(
        &self,
        repo_name: &str,
        owner: &str,
    ) -> Result<RepoMetadata, GatewayError> {
        let request = RepoInfoRequest {
            repo_name: repo_name.to_string(),
            owner: owner.to_string(),
        };
        self.post_json(GatewayOperation::RepoInfo, "/get_info", &request)
            .await
    }

    async fn fetch_assessment(&self, request: &AssessmentRequest) -> Result<String, GatewayError> {
        let response: AssessmentResponse = self
            .post_json(GatewayOperation::Assessment, "/get_ai_recs", request)
            .await?;
        Ok(response.ai_suggestions)
    }

    async fn continue_chat(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        let response: ChatResponse = self
            .post_json(GatewayOperation::Chat, "/ai_chat", request)
            .await?;
        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let config = AssessConfig {
            backend_url: "http://localhost:5000/".into(),
            ..AssessConfig::default()
        };
        let gateway = HttpGateway::new(&config).unwrap();
        assert_eq!(gateway.base_url(), "http://localhost:5000");
    }

    #[test]
    fn error_detail_prefers_backend_message() {
        assert_eq!(
            error_detail(r#"{"error": "Repository not found"}"#),
            "Repository not found"
        );
        assert_eq!(error_detail("  plain failure "), "plain failure");
    }

    #[test]
    fn error_detail_clips_long_bodies() {
        let body = "x".repeat(500);
        let detail = error_detail(&body);
        assert!(detail.ends_with("..."));
        assert_eq!(detail.chars().count(), MAX_ERROR_BODY_CHARS + 3);
    }

    #[test]
    fn summary_parses_backend_search_hit() {
        let hit: RepositorySummary = serde_json::from_str(
            r#"{"repo": "flask", "stars": 66000, "lang": "Python", "url": "https://github.com/pallets/flask",
                "owner": "pallets", "description": "web framework", "topics": ["wsgi"],
                "last_updated": "2024-01-01T00:00:00Z", "is_fork": false, "issues": 5}"#,
        )
        .unwrap();
        assert_eq!(hit.identity().full_name(), "pallets/flask");
        assert_eq!(hit.topics, ["wsgi"]);
    }
}

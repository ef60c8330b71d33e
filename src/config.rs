//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Default backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Assessment session configuration.
#[derive(Debug, Clone)]
pub struct AssessConfig {
    /// Base URL of the backend serving `/get_info`, `/get_ai_recs` and `/ai_chat`.
    pub backend_url: String,
    /// How long a message "streams" before it is committed to history.
    pub delivery_latency: Duration,
    /// Pause before each follow-up question and the analyzing notice.
    pub think_delay: Duration,
    /// Pause between repository info arriving and the first question.
    pub first_question_delay: Duration,
    /// Transport timeout applied to every backend request.
    pub request_timeout: Duration,
    /// Open free-form chat even when the initial assessment fails.
    /// When false, a failed assessment leaves the session in the error phase.
    pub chat_after_assessment_failure: bool,
    /// Where the skill and repository selection is persisted.
    pub selection_path: PathBuf,
}

impl Default for AssessConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            delivery_latency: Duration::from_millis(500),
            think_delay: Duration::from_millis(800),
            first_question_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(60),
            chat_after_assessment_failure: true,
            selection_path: default_selection_path(),
        }
    }
}

impl AssessConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backend_url = std::env::var("PRISM_BACKEND_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.backend_url);

        let chat_after_assessment_failure = std::env::var("PRISM_CHAT_AFTER_ASSESSMENT_FAILURE")
            .ok()
            .and_then(|s| parse_bool(&s))
            .unwrap_or(defaults.chat_after_assessment_failure);

        let selection_path = std::env::var("PRISM_SELECTION_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.selection_path);

        Self {
            backend_url,
            delivery_latency: env_millis("PRISM_DELIVERY_LATENCY_MS")
                .unwrap_or(defaults.delivery_latency),
            think_delay: env_millis("PRISM_THINK_DELAY_MS").unwrap_or(defaults.think_delay),
            first_question_delay: env_millis("PRISM_FIRST_QUESTION_DELAY_MS")
                .unwrap_or(defaults.first_question_delay),
            request_timeout: std::env::var("PRISM_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            chat_after_assessment_failure,
            selection_path,
        }
    }

    /// Zero every artificial delay. Used by tests and scripted runs.
    pub fn without_delays(mut self) -> Self {
        self.delivery_latency = Duration::ZERO;
        self.think_delay = Duration::ZERO;
        self.first_question_delay = Duration::ZERO;
        self
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_selection_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".prism/selection.json")
}

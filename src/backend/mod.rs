//! Answer service client and backend adapters.
//!
//! The answer service is an external HTTP endpoint that takes a question and
//! returns an answer. Two backend shapes are supported; which one is used is
//! a configuration choice, not something probed at runtime.
//!
//! # Adapters
//!
//! - [`TextResponseAdapter`]: `{"question": ..}` → `{"result": true, "message": {"text_response": ..}}`
//! - [`AnalysisAdapter`]: `{"query": ..}` → `{"analysis": ..}`
//!
//! # Example
//!
//! ```rust
//! use insights_chat::backend::{BackendVariant, ResponseAdapter};
//! use serde_json::json;
//!
//! let adapter = BackendVariant::Analysis.adapter();
//! assert_eq!(adapter.request_body("sales?"), json!({ "query": "sales?" }));
//! assert_eq!(
//!     adapter.extract_answer(&json!({ "analysis": "Sales up 5%" })).unwrap(),
//!     "Sales up 5%"
//! );
//! ```

pub mod adapter;
pub mod http;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

pub use adapter::{
    AnalysisAdapter, NO_RESPONSE_AVAILABLE, ParseError, ResponseAdapter, TextResponseAdapter,
};
pub use http::HttpAnswerService;

use crate::session::SessionId;

/// Turn text used when the response had the wrong shape.
pub const UNABLE_TO_GET_RESPONSE: &str = "Error: Unable to get response";

/// Backend response shape.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum BackendVariant {
    /// `{"question"}` in, `message.text_response` out.
    #[default]
    #[value(name = "text_response")]
    TextResponse,
    /// `{"query"}` in, `analysis` out.
    Analysis,
}

impl BackendVariant {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextResponse => "text_response",
            Self::Analysis => "analysis",
        }
    }

    /// Endpoint used when no URL is configured.
    #[must_use]
    pub fn default_url(self) -> &'static str {
        match self {
            Self::TextResponse => {
                "https://9xfvj7u0m8.execute-api.us-east-1.amazonaws.com/dev/chat/generate-response"
            }
            Self::Analysis => "https://b2h8gu3v15.execute-api.us-east-1.amazonaws.com/dev/query",
        }
    }

    /// Adapter translating requests and responses for this variant.
    #[must_use]
    pub fn adapter(self) -> Arc<dyn ResponseAdapter> {
        match self {
            Self::TextResponse => Arc::new(TextResponseAdapter),
            Self::Analysis => Arc::new(AnalysisAdapter),
        }
    }
}

impl fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer service connection settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Endpoint receiving the POST.
    pub url: Url,
    /// Request/response shape.
    pub variant: BackendVariant,
    /// Whether to send the session identifier as `X-Session-Id`.
    pub tag_session: bool,
}

/// Failure of a single answer call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never got a response.
    #[error("{0}")]
    Transport(#[source] reqwest::Error),
    /// The service answered with a non-2xx status.
    #[error("{status} for url ({url})")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    /// The response body was not JSON.
    #[error("invalid response body: {0}")]
    Body(#[source] reqwest::Error),
    /// The JSON did not have the shape the adapter expects.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The task making the call stopped before it produced an outcome.
    #[error("answer task failed: {0}")]
    Task(String),
}

impl BackendError {
    /// Text of the assistant turn that reports this failure.
    #[must_use]
    pub fn turn_text(&self) -> String {
        match self {
            Self::Parse(_) => UNABLE_TO_GET_RESPONSE.to_string(),
            other => format!("Error connecting to the API: {other}"),
        }
    }
}

/// Trait for services that answer a user question.
#[async_trait::async_trait]
pub trait AnswerService: Send + Sync {
    /// Produce the answer text for `question`.
    ///
    /// Called exactly once per user turn; implementations must not retry.
    async fn answer(&self, question: &str, session_id: &SessionId) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_names_match_config_values() {
        let v: BackendVariant = serde_json::from_str(r#""analysis""#).unwrap();
        assert_eq!(v, BackendVariant::Analysis);
        assert_eq!(BackendVariant::TextResponse.to_string(), "text_response");
        assert_eq!(BackendVariant::default(), BackendVariant::TextResponse);
    }

    #[test]
    fn test_default_urls_parse() {
        for v in [BackendVariant::TextResponse, BackendVariant::Analysis] {
            assert!(Url::parse(v.default_url()).is_ok());
        }
    }

    #[test]
    fn test_turn_text_by_failure_kind() {
        let shape = BackendError::Parse(ParseError::NotSuccessful);
        assert_eq!(shape.turn_text(), UNABLE_TO_GET_RESPONSE);

        let status = BackendError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            url: "http://localhost/query".to_string(),
        };
        let text = status.turn_text();
        assert!(text.starts_with("Error connecting to the API: "));
        assert!(text.contains("502"));

        let task = BackendError::Task("task 7 panicked".to_string());
        assert_eq!(
            task.turn_text(),
            "Error connecting to the API: answer task failed: task 7 panicked"
        );
    }
}

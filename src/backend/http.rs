//! HTTP answer service.
//!
//! Sends one JSON POST per question and hands the response body to the
//! configured [`ResponseAdapter`].

use std::sync::Arc;

use url::Url;

use crate::session::SessionId;

use super::{AnswerService, BackendError, BackendSettings, ResponseAdapter};

/// Header carrying the session identifier when tagging is enabled.
pub const SESSION_HEADER: &str = "X-Session-Id";

/// Answer service reached over HTTP.
///
/// No request timeout is set; failures are returned once and
/// never retried.
#[derive(Clone)]
pub struct HttpAnswerService {
    http: reqwest::Client,
    url: Url,
    adapter: Arc<dyn ResponseAdapter>,
    tag_session: bool,
}

impl std::fmt::Debug for HttpAnswerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAnswerService")
            .field("url", &self.url.as_str())
            .field("adapter", &self.adapter)
            .field("tag_session", &self.tag_session)
            .finish()
    }
}

impl HttpAnswerService {
    /// Create a service for the given settings.
    #[must_use]
    pub fn new(settings: BackendSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    /// Create a service that sends through an existing client.
    #[must_use]
    pub fn with_client(http: reqwest::Client, settings: BackendSettings) -> Self {
        Self {
            http,
            adapter: settings.variant.adapter(),
            url: settings.url,
            tag_session: settings.tag_session,
        }
    }
}

#[async_trait::async_trait]
impl AnswerService for HttpAnswerService {
    async fn answer(&self, question: &str, session_id: &SessionId) -> Result<String, BackendError> {
        let body = self.adapter.request_body(question);

        let mut rb = self.http.post(self.url.clone()).json(&body);
        if self.tag_session {
            rb = rb.header(SESSION_HEADER, session_id.to_string());
        }

        tracing::debug!(
            session_id = %session_id,
            url = %self.url,
            "Sending question to answer service"
        );

        let resp = rb.send().await.map_err(BackendError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status,
                url: self.url.to_string(),
            });
        }

        let json: serde_json::Value = resp.json().await.map_err(BackendError::Body)?;
        let answer = self.adapter.extract_answer(&json)?;

        tracing::debug!(
            session_id = %session_id,
            status = %status,
            answer_length = answer.len(),
            "Answer service responded"
        );

        Ok(answer)
    }
}

//! Request/response adapters for the supported backend shapes.

use serde_json::{Value, json};

/// Turn text used when the answer field is present but empty.
pub const NO_RESPONSE_AVAILABLE: &str = "No response available";

/// Response JSON did not match the adapter's expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("response body is not a JSON object")]
    NotAnObject,
    #[error("backend did not report success")]
    NotSuccessful,
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
}

/// Translates between a question and one backend's JSON wire shape.
pub trait ResponseAdapter: Send + Sync + std::fmt::Debug {
    /// JSON body sent for `question`.
    fn request_body(&self, question: &str) -> Value;

    /// Answer text carried by a successful response body.
    fn extract_answer(&self, body: &Value) -> Result<String, ParseError>;
}

/// `{"question": q}` → `{"result": true, "message": {"text_response": s}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextResponseAdapter;

impl ResponseAdapter for TextResponseAdapter {
    fn request_body(&self, question: &str) -> Value {
        json!({ "question": question })
    }

    fn extract_answer(&self, body: &Value) -> Result<String, ParseError> {
        let body = body.as_object().ok_or(ParseError::NotAnObject)?;
        if body.get("result") != Some(&Value::Bool(true)) {
            return Err(ParseError::NotSuccessful);
        }
        let message = body
            .get("message")
            .ok_or(ParseError::MissingField("message"))?;
        Ok(answer_text(message.get("text_response")))
    }
}

/// `{"query": q}` → `{"analysis": s}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisAdapter;

impl ResponseAdapter for AnalysisAdapter {
    fn request_body(&self, question: &str) -> Value {
        json!({ "query": question })
    }

    fn extract_answer(&self, body: &Value) -> Result<String, ParseError> {
        let body = body.as_object().ok_or(ParseError::NotAnObject)?;
        let analysis = body
            .get("analysis")
            .ok_or(ParseError::MissingField("analysis"))?;
        Ok(answer_text(Some(analysis)))
    }
}

/// Strings pass through, null or absent becomes the placeholder, anything
/// else is shown as its JSON text.
fn answer_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NO_RESPONSE_AVAILABLE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

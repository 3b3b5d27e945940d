//! Model client abstraction.
//!
//! The optimization loop talks to language models through the
//! [`ModelClient`] trait so tests can substitute scripted doubles and
//! sessions can carry their own model/temperature configuration.
//! [`OpenAiCompatClient`] is the production implementation: it calls any
//! OpenAI-compatible Chat Completions endpoint and asks for a structured
//! JSON object reply, validated once at this boundary. The rest of the
//! engine only ever sees the validated `serde_json::Value`.

use async_trait::async_trait;
use opro_core::metrics::UsageMetrics;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors produced at the model-call boundary.
#[derive(Error, Debug, Clone)]
pub enum ModelClientError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success HTTP status from the endpoint
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// The endpoint replied without any usable content
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// The reply content was not the expected JSON object
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl ModelClientError {
    /// Whether a retry attempt is worthwhile.
    ///
    /// Transport errors, empty bodies and malformed structured output are
    /// retryable; client-side HTTP errors (4xx other than 429) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::EmptyResponse | Self::MalformedResponse(_) => true,
            Self::Status { code, .. } => {
                matches!(
                    StatusCode::from_u16(*code),
                    Ok(StatusCode::TOO_MANY_REQUESTS
                        | StatusCode::INTERNAL_SERVER_ERROR
                        | StatusCode::BAD_GATEWAY
                        | StatusCode::SERVICE_UNAVAILABLE
                        | StatusCode::GATEWAY_TIMEOUT)
                )
            }
        }
    }
}

/// A client that can ask a model for a single structured JSON reply.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends `prompt` to `model` and returns the parsed JSON object the
    /// model replied with.
    async fn complete_json(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<serde_json::Value, ModelClientError>;
}

/// Client for OpenAI-compatible Chat Completions endpoints.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    metrics: Option<Arc<UsageMetrics>>,
}

impl OpenAiCompatClient {
    /// Creates a client for the given API base URL (e.g.
    /// `https://api.openai.com` or a local inference server).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            metrics: None,
        }
    }

    /// Attaches a bearer API key sent with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Attaches a usage-metrics sink recording requests and failures.
    pub fn with_metrics(mut self, metrics: Arc<UsageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn send_request(
        &self,
        body: &ChatCompletionRequest<'_>,
    ) -> Result<String, ModelClientError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut request = self.client.post(&url).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ModelClientError::Http(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ModelClientError::Status {
                code: status.as_u16(),
                message: extract_error_message(&body_text),
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| ModelClientError::MalformedResponse(format!("invalid body: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModelClientError::EmptyResponse)
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn complete_json(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<serde_json::Value, ModelClientError> {
        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_request();
        }

        let result = self.send_request(&request).await.and_then(|content| {
            serde_json::from_str(&content).map_err(|err| {
                ModelClientError::MalformedResponse(format!("content is not valid JSON: {err}"))
            })
        });

        if result.is_err() {
            if let Some(metrics) = &self.metrics {
                metrics.record_failure();
            }
        }

        result
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| wrapper.error.message)
        .unwrap_or_else(|| body.to_string())
}

/// Scripted model client for tests: hands out queued responses in order
/// and counts calls. Once the queue is drained it keeps returning the
/// last response.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<serde_json::Value, ModelClientError>>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<serde_json::Value, ModelClientError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A client that always answers with the same JSON value.
    pub fn always(value: serde_json::Value) -> Self {
        Self::new(vec![Ok(value)])
    }

    /// A client that always fails with the same error.
    pub fn always_error(error: ModelClientError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Number of `complete_json` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete_json(
        &self,
        _prompt: &str,
        _model: &str,
        _temperature: f32,
    ) -> Result<serde_json::Value, ModelClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap_or(Err(ModelClientError::EmptyResponse))
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or(Err(ModelClientError::EmptyResponse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retryable_classification() {
        assert!(ModelClientError::Http("reset".into()).is_retryable());
        assert!(ModelClientError::EmptyResponse.is_retryable());
        assert!(ModelClientError::MalformedResponse("x".into()).is_retryable());
        assert!(ModelClientError::Status { code: 429, message: String::new() }.is_retryable());
        assert!(ModelClientError::Status { code: 503, message: String::new() }.is_retryable());
        assert!(!ModelClientError::Status { code: 400, message: String::new() }.is_retryable());
        assert!(!ModelClientError::Status { code: 401, message: String::new() }.is_retryable());
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"error": {"message": "model overloaded"}}"#;
        assert_eq!(extract_error_message(body), "model overloaded");
        assert_eq!(extract_error_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_scripted_client_pops_then_repeats() {
        let client = ScriptedClient::new(vec![
            Ok(json!({"n": 1})),
            Ok(json!({"n": 2})),
        ]);

        let first = client.complete_json("", "m", 0.0).await.unwrap();
        assert_eq!(first["n"], 1);
        let second = client.complete_json("", "m", 0.0).await.unwrap();
        assert_eq!(second["n"], 2);
        // queue drained to one entry: it repeats
        let third = client.complete_json("", "m", 0.0).await.unwrap();
        assert_eq!(third["n"], 2);
        assert_eq!(client.call_count(), 3);
    }
}

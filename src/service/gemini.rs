//! Gemini `generateContent` client.
//!
//! One [`GeminiService::generate`] call is one `POST
//! {base}/v1beta/models/{model}:generateContent` request with
//! `responseMimeType: application/json` and the resume schema attached, so the
//! model is constrained to the record shape server-side.
//!
//! Failures keep the API's error envelope intact:
//!
//! ```json
//! {"error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}}
//! ```
//!
//! becomes `ServiceError { code: Some(503), status: Some("UNAVAILABLE"), .. }`,
//! which is exactly what [`ServiceError::is_transient`] looks at.

use super::{StructuringRequest, StructuringService};
use crate::config::PipelineConfig;
use crate::error::{ResumeError, ServiceError};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Gemini REST backend.
#[derive(Clone)]
pub struct GeminiService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiService {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ResumeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ResumeError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into().trim().to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    /// Build from config, reading the key from `GEMINI_API_KEY` when unset.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ResumeError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ResumeError::ProviderNotConfigured {
                provider: "gemini".to_string(),
                hint: format!("Set {API_KEY_ENV} or pass --api-key."),
            })?;

        Self::new(api_key, &config.api_base_url, config.api_timeout_secs)
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    async fn call(&self, request: &StructuringRequest) -> Result<String, ServiceError> {
        let url = self.endpoint(&request.model);
        let body = request_body(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &text));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ServiceError::new(format!("Unreadable response envelope: {e}")))?;
        let content = extract_text(&value)?;
        let usage = value.get("usageMetadata").cloned().unwrap_or(Value::Null);
        debug!("gemini: {} chars of content, usage {}", content.len(), usage);
        Ok(content)
    }

    fn transport_error(&self, e: reqwest::Error) -> ServiceError {
        let err = if e.is_timeout() {
            ServiceError::new(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            ServiceError::new(format!("Request failed: {e}"))
        };
        match e.status() {
            Some(code) => err.with_code(code.as_u16()),
            None => err,
        }
    }
}

impl StructuringService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate<'a>(
        &'a self,
        request: &'a StructuringRequest,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        self.call(request).boxed()
    }
}

/// `generateContent` request body.
fn request_body(request: &StructuringRequest) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": request.prompt() }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.schema,
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        }
    })
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

/// Turn a non-2xx response into a [`ServiceError`], preferring the API's own
/// envelope and falling back to the HTTP status.
fn parse_error_body(http_status: u16, body: &str) -> ServiceError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => {
            let message = error
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("HTTP {http_status}"));
            let err = ServiceError::new(message).with_code(error.code.unwrap_or(http_status));
            match error.status {
                Some(status) => err.with_status(status),
                None => err,
            }
        }
        Err(_) => {
            let message = if body.trim().is_empty() {
                format!("HTTP {http_status}")
            } else {
                format!("HTTP {http_status}: {}", body.trim())
            };
            ServiceError::new(message).with_code(http_status)
        }
    }
}

/// Concatenate the text parts of the first candidate.
///
/// A response with no candidates means the prompt was blocked; a candidate
/// with no text yields an empty body, which the decoder then rejects.
fn extract_text(value: &Value) -> Result<String, ServiceError> {
    let Some(candidate) = value["candidates"].as_array().and_then(|c| c.first()) else {
        let reason = value["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("no candidates returned");
        return Err(ServiceError::new(format!("Response blocked: {reason}")));
    };

    let text = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(text)
}

//! edgequake-llm adapter for non-Gemini providers.
//!
//! These providers have no portable response-schema option, so the schema is
//! spelled out in the system message and the model is told to answer with a
//! bare JSON object. Fenced or padded answers are cleaned up later by
//! [`crate::pipeline::response`].
//!
//! Provider errors only expose their display text; [`classify`] maps the
//! overload signals found there back onto [`ServiceError`]'s code/status
//! fields so the shared retry policy applies unchanged.

use super::{StructuringRequest, StructuringService};
use crate::error::{ResumeError, ServiceError, UNAVAILABLE_CODE, UNAVAILABLE_STATUS};
use crate::prompts;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::debug;

/// Structuring backend over any edgequake-llm provider.
pub struct ProviderService {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderService {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Instantiate a named provider (`openai`, `anthropic`, `ollama`, …).
    ///
    /// The provider reads its API key from the usual environment variable
    /// (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …).
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, ResumeError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            ResumeError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, provider_name.to_ascii_lowercase()))
    }

    async fn call(&self, request: &StructuringRequest) -> Result<String, ServiceError> {
        let messages = build_messages(request);
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify(&e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

impl StructuringService for ProviderService {
    fn name(&self) -> &str {
        &self.label
    }

    fn generate<'a>(
        &'a self,
        request: &'a StructuringRequest,
    ) -> BoxFuture<'a, Result<String, ServiceError>> {
        self.call(request).boxed()
    }
}

/// System message carries instructions + schema; user message carries the text.
fn build_messages(request: &StructuringRequest) -> Vec<ChatMessage> {
    let system = prompts::build_prompt_with_inline_schema(&request.instructions, "");
    let system = system.trim_end().to_string();
    vec![
        ChatMessage::system(system),
        ChatMessage::user(request.raw_text.clone()),
    ]
}

/// Recover overload signals from a provider error's display text.
fn classify(message: &str) -> ServiceError {
    let mut err = ServiceError::new(message);
    if message.contains("503") {
        err.code = Some(UNAVAILABLE_CODE);
    }
    let upper = message.to_ascii_uppercase();
    if upper.contains(UNAVAILABLE_STATUS) || upper.contains("OVERLOADED") {
        err.status = Some(UNAVAILABLE_STATUS.to_string());
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_503_is_transient() {
        let err = classify("API error: 503 Service Unavailable");
        assert_eq!(err.code, Some(503));
        assert!(err.is_transient());
    }

    #[test]
    fn classify_overloaded_is_transient() {
        let err = classify("overloaded_error: Overloaded");
        assert_eq!(err.status.as_deref(), Some("UNAVAILABLE"));
        assert!(err.is_transient());
    }

    #[test]
    fn classify_auth_failure_is_terminal() {
        let err = classify("Authentication failed: invalid x-api-key (401)");
        assert_eq!(err.code, None);
        assert_eq!(err.status, None);
        assert!(!err.is_transient());
    }

    #[test]
    fn classify_keeps_message_verbatim() {
        assert_eq!(classify("rate limited").message, "rate limited");
    }
}

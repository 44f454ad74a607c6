//! The structuring service seam.
//!
//! [`StructuringService`] is the only place the pipeline touches the network
//! during structuring: one call to [`StructuringService::generate`] is one
//! attempt. Retry, backoff and decoding live one layer up in
//! [`crate::pipeline::structure`], so every backend stays a thin request/
//! response adapter.
//!
//! Two backends ship with the crate:
//!
//! * [`GeminiService`]: the Generative Language REST API, with native
//!   `responseSchema` support and the `{code, status, message}` error envelope
//!   the transient classification is built around.
//! * [`ProviderService`]: any edgequake-llm provider (OpenAI, Anthropic,
//!   Ollama, …); the schema travels inside the prompt.

pub mod gemini;
pub mod provider;

pub use gemini::GeminiService;
pub use provider::ProviderService;

use crate::config::PipelineConfig;
use crate::error::{ResumeError, ServiceError};
use crate::prompts;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Everything a backend needs for one structuring attempt.
#[derive(Debug, Clone)]
pub struct StructuringRequest {
    pub model: String,
    pub instructions: String,
    /// Extracted resume text, embedded verbatim.
    pub raw_text: String,
    pub schema: Value,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl StructuringRequest {
    /// Build the request for `raw_text` from the pipeline configuration.
    pub fn from_config(raw_text: impl Into<String>, config: &PipelineConfig) -> Self {
        Self {
            model: config.model().to_string(),
            instructions: config.instructions().to_string(),
            raw_text: raw_text.into(),
            schema: prompts::response_schema(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Instructions followed by the raw text.
    pub fn prompt(&self) -> String {
        prompts::build_prompt(&self.instructions, &self.raw_text)
    }
}

/// A generation backend that turns a [`StructuringRequest`] into a JSON body.
///
/// Implementations make exactly one network call per `generate` and must not
/// retry internally; the returned `ServiceError` is what the retry policy
/// classifies.
pub trait StructuringService: Send + Sync {
    /// Short backend name for logs, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Perform one attempt and return the raw response body text.
    fn generate<'a>(
        &'a self,
        request: &'a StructuringRequest,
    ) -> BoxFuture<'a, Result<String, ServiceError>>;
}

/// Resolve the structuring backend, from most-specific to least-specific.
///
/// 1. **Pre-built service** (`config.service`): used as-is; this is how tests
///    and embedders inject fakes or middleware.
/// 2. **Gemini** (`provider_name` unset or `"gemini"`): API key from
///    `config.api_key`, else `GEMINI_API_KEY`.
/// 3. **Named edgequake-llm provider**: requires `config.model`.
pub fn resolve_service(config: &PipelineConfig) -> Result<Arc<dyn StructuringService>, ResumeError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }

    if config.uses_gemini() {
        return Ok(Arc::new(GeminiService::from_config(config)?));
    }

    let name = config.provider_name.as_deref().unwrap_or_default();
    let model = config
        .model
        .as_deref()
        .ok_or_else(|| ResumeError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: "A model is required for non-Gemini providers. Pass --model <ID>.".to_string(),
        })?;
    Ok(Arc::new(ProviderService::from_name(name, model)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    struct Echo;

    impl StructuringService for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn generate<'a>(
            &'a self,
            request: &'a StructuringRequest,
        ) -> BoxFuture<'a, Result<String, ServiceError>> {
            async move { Ok(request.raw_text.clone()) }.boxed()
        }
    }

    #[test]
    fn request_from_config_uses_defaults() {
        let config = PipelineConfig::default();
        let req = StructuringRequest::from_config("text", &config);
        assert_eq!(req.model, crate::config::DEFAULT_MODEL);
        assert_eq!(req.instructions, prompts::DEFAULT_INSTRUCTIONS);
        assert_eq!(req.max_tokens, 8192);
        assert!(req.prompt().ends_with("text\n"));
    }

    #[test]
    fn injected_service_takes_priority() {
        let config = PipelineConfig::builder()
            .provider_name("openai")
            .service(Arc::new(Echo))
            .build()
            .unwrap();
        let service = resolve_service(&config).unwrap();
        assert_eq!(service.name(), "echo");
    }

    #[test]
    fn non_gemini_provider_requires_model() {
        let config = PipelineConfig::builder().provider_name("openai").build().unwrap();
        let err = resolve_service(&config).err().expect("should fail");
        assert!(matches!(err, ResumeError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn echo_service_round_trip() {
        let req = StructuringRequest::from_config("{}", &PipelineConfig::default());
        let body = tokio_test::block_on(Echo.generate(&req)).unwrap();
        assert_eq!(body, "{}");
    }
}

//! Configuration types for the resume pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Every knob lives in one struct so a config
//! can be shared with the CLI, logged, and compared between runs.

use crate::error::ResumeError;
use crate::pipeline::structure::RetryPolicy;
use crate::progress::ProgressCallback;
use crate::service::StructuringService;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Provider name that selects the built-in Gemini REST client.
pub const GEMINI_PROVIDER: &str = "gemini";

/// Base URL of the Generative Language API.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for a pipeline run.
///
/// # Example
/// ```rust
/// use resume2tex::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gemini-2.5-flash")
///     .max_retries(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.retry_policy().max_retries, 5);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, the Gemini client uses [`DEFAULT_MODEL`]; other providers
    /// require one.
    pub model: Option<String>,

    /// Structuring provider. `None` or `"gemini"` selects the Gemini REST
    /// client; any other name goes through edgequake-llm's provider factory.
    pub provider_name: Option<String>,

    /// Pre-constructed structuring service. Takes precedence over `provider_name`.
    pub service: Option<Arc<dyn StructuringService>>,

    /// Gemini API key. Falls back to `GEMINI_API_KEY` when `None`.
    pub api_key: Option<String>,

    /// Gemini endpoint root. Default: [`GEMINI_BASE_URL`].
    pub api_base_url: String,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Low enough to keep the model faithful to the source text, high enough
    /// to let it rephrase bullet points.
    pub temperature: f32,

    /// Maximum output tokens per structuring call. Default: 8192.
    ///
    /// Long resumes with many projects can exceed 4 000 tokens of JSON, and a
    /// truncated body never decodes.
    pub max_tokens: usize,

    /// Retries after the first attempt on a transient failure. Default: 3.
    pub max_retries: u32,

    /// Backoff before the first retry, doubled for each later one. Default: 1000 ms.
    pub retry_base_delay_ms: u64,

    /// Also retry when the service answers but the body does not decode.
    /// Default: false.
    pub retry_malformed_output: bool,

    /// Custom instructions. If None, uses [`crate::prompts::DEFAULT_INSTRUCTIONS`].
    pub instructions: Option<String>,

    /// Per-attempt HTTP timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Directory containing the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, the working directory, then the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional stage/retry callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            service: None,
            api_key: None,
            api_base_url: GEMINI_BASE_URL.to_string(),
            temperature: 0.2,
            max_tokens: 8192,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_malformed_output: false,
            instructions: None,
            api_timeout_secs: 120,
            download_timeout_secs: 60,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("service", &self.service.as_ref().map(|_| "<dyn StructuringService>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_malformed_output", &self.retry_malformed_output)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The retry schedule for the structuring call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_malformed_output: self.retry_malformed_output,
        }
    }

    /// Model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Instructions to send, falling back to the built-in default.
    pub fn instructions(&self) -> &str {
        self.instructions
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_INSTRUCTIONS)
    }

    /// Whether the built-in Gemini client should be used.
    pub fn uses_gemini(&self) -> bool {
        self.provider_name
            .as_deref()
            .is_none_or(|name| name.eq_ignore_ascii_case(GEMINI_PROVIDER))
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn service(mut self, service: Arc<dyn StructuringService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn retry_malformed_output(mut self, v: bool) -> Self {
        self.config.retry_malformed_output = v;
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = Some(text.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ResumeError> {
        let c = &self.config;
        if c.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(ResumeError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(ResumeError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_retries > 10 {
            return Err(ResumeError::InvalidConfig(format!(
                "max_retries must be 0–10, got {}",
                c.max_retries
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(ResumeError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

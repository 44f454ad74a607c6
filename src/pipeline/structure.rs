//! Structuring: raw text in, validated [`ResumeRecord`] out.
//!
//! ## Retry Strategy
//!
//! The generation API sheds load with `503 UNAVAILABLE` ("the model is
//! overloaded", "high demand") far more often than it fails for real. Those
//! failures are retried with exponential backoff (`base_delay * 2^attempt`):
//! with the default 1 s base and 3 retries the wait sequence is
//! 1 s → 2 s → 4 s, four attempts and 7 s of backoff in the worst case.
//! Anything else (bad key, invalid argument, blocked prompt) aborts at once.
//!
//! The loop is written as an explicit state machine over [`AttemptState`]
//! with the retry decision factored into the pure
//! [`RetryPolicy::next_action`], so the schedule can be tested without a
//! clock and the loop can be tested with tokio's paused clock.

use crate::config::PipelineConfig;
use crate::error::{ResumeError, ServiceError};
use crate::pipeline::response::clean_json_body;
use crate::progress::ProgressCallback;
use crate::record::{DecodeError, ResumeRecord};
use crate::service::{StructuringRequest, StructuringService};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// When and how long to back off between structuring attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay after the first failed attempt; doubled for each later one.
    pub base_delay: Duration,
    /// Treat an undecodable body like a transient failure.
    pub retry_malformed_output: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            retry_malformed_output: false,
        }
    }
}

/// Outcome of [`RetryPolicy::next_action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Sleep for the delay, then make another attempt.
    Retry(Duration),
    /// Give up and report the failure.
    Abort,
}

/// Why one attempt did not produce a record.
#[derive(Debug)]
pub enum AttemptFailure {
    /// The service call itself failed.
    Service(ServiceError),
    /// The service answered, but the body is not a valid record.
    Malformed(DecodeError),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Service(e) => f.write_str(&e.message),
            AttemptFailure::Malformed(e) => write!(f, "failed to transform resume data: {e}"),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Decide what follows the failed attempt with 0-based index `attempt`.
    pub fn next_action(&self, failure: &AttemptFailure, attempt: u32) -> NextAction {
        let retryable = match failure {
            AttemptFailure::Service(e) => e.is_transient(),
            AttemptFailure::Malformed(_) => self.retry_malformed_output,
        };
        if retryable && attempt < self.max_retries {
            NextAction::Retry(self.delay_for(attempt))
        } else {
            NextAction::Abort
        }
    }
}

/// States of the structuring loop. Attempt numbers are 0-based in
/// `Attempting` and counts in `Failed`.
#[derive(Debug)]
pub enum AttemptState {
    Attempting(u32),
    Success(ResumeRecord),
    Failed(u32, AttemptFailure),
}

/// A structured record plus how many attempts it took.
#[derive(Debug, Clone)]
pub struct Structured {
    pub record: ResumeRecord,
    pub attempts: u32,
    pub duration: Duration,
}

/// Turn extracted text into a validated record, retrying per `config`.
///
/// Returns [`ResumeError::Transform`] carrying the last failure's message
/// when retries run out or the failure is not retryable.
pub async fn structure(
    service: &dyn StructuringService,
    raw_text: &str,
    config: &PipelineConfig,
) -> Result<Structured, ResumeError> {
    let start = Instant::now();
    let policy = config.retry_policy();
    let request = StructuringRequest::from_config(raw_text, config);

    info!(
        "Structuring {} chars of text with {} ({})",
        raw_text.len(),
        service.name(),
        request.model
    );

    let mut attempts = 0u32;
    let mut state = AttemptState::Attempting(0);

    loop {
        state = match state {
            AttemptState::Attempting(n) => {
                attempts = n + 1;
                match attempt_once(service, &request).await {
                    Ok(record) => AttemptState::Success(record),
                    Err(failure) => match policy.next_action(&failure, n) {
                        NextAction::Retry(delay) => {
                            let message = failure.to_string();
                            warn!(
                                "AI model busy, retrying in {}ms... (Attempt {}/{}): {}",
                                delay.as_millis(),
                                n + 1,
                                policy.max_retries,
                                message
                            );
                            notify_retry(
                                config.progress_callback.as_ref(),
                                n + 1,
                                policy.max_retries,
                                delay,
                                &message,
                            );
                            sleep(delay).await;
                            AttemptState::Attempting(n + 1)
                        }
                        NextAction::Abort => AttemptState::Failed(n + 1, failure),
                    },
                }
            }
            AttemptState::Success(record) => {
                let duration = start.elapsed();
                debug!("Structured in {} attempt(s), {:?}", attempts, duration);
                return Ok(Structured {
                    record,
                    attempts,
                    duration,
                });
            }
            AttemptState::Failed(count, failure) => {
                let message = failure.to_string();
                debug!("Giving up after {} attempt(s)", count);
                return Err(ResumeError::Transform {
                    attempts: count,
                    message,
                });
            }
        };
    }
}

/// One network call, then cleanup and validating decode.
async fn attempt_once(
    service: &dyn StructuringService,
    request: &StructuringRequest,
) -> Result<ResumeRecord, AttemptFailure> {
    let body = service
        .generate(request)
        .await
        .map_err(AttemptFailure::Service)?;
    let cleaned = clean_json_body(&body);
    debug!("Response body: {} chars ({} after cleanup)", body.len(), cleaned.len());
    ResumeRecord::from_json(&cleaned).map_err(AttemptFailure::Malformed)
}

fn notify_retry(
    callback: Option<&ProgressCallback>,
    attempt: u32,
    max_retries: u32,
    delay: Duration,
    message: &str,
) {
    if let Some(cb) = callback {
        cb.on_retry(attempt, max_retries, delay, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    const RECORD: &str = r#"{"name":"Jane Doe","email":"jane@example.com","phone":"555",
        "skills":{"languages":["Rust"]},"experience":[],"projects":[],"education":[],
        "achievements":[]}"#;

    /// Plays back a fixed list of responses; repeats the last one when drained.
    struct Scripted {
        script: Mutex<VecDeque<Result<String, ServiceError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(script: Vec<Result<String, ServiceError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StructuringService for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate<'a>(
            &'a self,
            _request: &'a StructuringRequest,
        ) -> BoxFuture<'a, Result<String, ServiceError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            };
            async move { next }.boxed()
        }
    }

    fn busy() -> Result<String, ServiceError> {
        Err(ServiceError::unavailable("The model is overloaded. Please try again later."))
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_secs(1));
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn next_action_retries_transient_until_budget_spent() {
        let p = RetryPolicy::default();
        let f = AttemptFailure::Service(ServiceError::unavailable("busy"));
        assert_eq!(p.next_action(&f, 0), NextAction::Retry(Duration::from_secs(1)));
        assert_eq!(p.next_action(&f, 2), NextAction::Retry(Duration::from_secs(4)));
        assert_eq!(p.next_action(&f, 3), NextAction::Abort);
    }

    #[test]
    fn next_action_aborts_on_terminal_error() {
        let p = RetryPolicy::default();
        let f = AttemptFailure::Service(ServiceError::new("API key not valid").with_code(400));
        assert_eq!(p.next_action(&f, 0), NextAction::Abort);
    }

    #[test]
    fn demand_message_alone_is_retryable() {
        let p = RetryPolicy::default();
        let f = AttemptFailure::Service(ServiceError::new("Model is under high demand"));
        assert!(matches!(p.next_action(&f, 0), NextAction::Retry(_)));
    }

    #[test]
    fn malformed_output_retry_is_opt_in() {
        let err = ResumeRecord::from_json("not json").unwrap_err();
        let f = AttemptFailure::Malformed(err);
        assert_eq!(RetryPolicy::default().next_action(&f, 0), NextAction::Abort);

        let p = RetryPolicy {
            retry_malformed_output: true,
            ..RetryPolicy::default()
        };
        assert!(matches!(p.next_action(&f, 0), NextAction::Retry(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fourth_attempt_after_seven_seconds() {
        let svc = Scripted::new(vec![busy(), busy(), busy(), Ok(RECORD.to_string())]);
        let config = PipelineConfig::default();

        let start = tokio::time::Instant::now();
        let out = structure(&svc, "text", &config).await.unwrap();
        let waited = start.elapsed();

        assert_eq!(out.record.name, "Jane Doe");
        assert_eq!(out.attempts, 4);
        assert_eq!(svc.calls(), 4);
        assert!(waited >= Duration::from_secs(7), "waited {waited:?}");
        assert!(waited < Duration::from_secs(8), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_four_transient_failures() {
        let svc = Scripted::new(vec![busy()]);
        let err = structure(&svc, "text", &PipelineConfig::default())
            .await
            .unwrap_err();

        assert_eq!(svc.calls(), 4);
        match err {
            ResumeError::Transform { attempts, message } => {
                assert_eq!(attempts, 4);
                assert!(message.contains("overloaded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_makes_exactly_one_attempt() {
        let svc = Scripted::new(vec![Err(
            ServiceError::new("API key not valid").with_code(400).with_status("INVALID_ARGUMENT"),
        )]);
        let start = tokio::time::Instant::now();
        let err = structure(&svc, "text", &PipelineConfig::default())
            .await
            .unwrap_err();

        assert_eq!(svc.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(err, ResumeError::Transform { attempts: 1, .. }));
        assert_eq!(err.to_string(), "API key not valid");
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_body_fails_without_retry() {
        let svc = Scripted::new(vec![Ok("{\"name\": \"Jane\"".to_string())]);
        let err = structure(&svc, "text", &PipelineConfig::default())
            .await
            .unwrap_err();

        assert_eq!(svc.calls(), 1);
        assert!(err
            .to_string()
            .starts_with("failed to transform resume data:"));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_body_retried_when_enabled() {
        let svc = Scripted::new(vec![Ok("oops".to_string()), Ok(RECORD.to_string())]);
        let config = PipelineConfig::builder()
            .retry_malformed_output(true)
            .build()
            .unwrap();
        let out = structure(&svc, "text", &config).await.unwrap();
        assert_eq!(out.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fenced_body_is_cleaned_before_decode() {
        let fenced = format!("```json\n{RECORD}\n```");
        let svc = Scripted::new(vec![Ok(fenced)]);
        let out = structure(&svc, "text", &PipelineConfig::default())
            .await
            .unwrap();
        assert_eq!(out.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_events_reach_the_callback() {
        use crate::progress::PipelineProgressCallback;

        #[derive(Default)]
        struct Retries(Mutex<Vec<(u32, Duration)>>);
        impl PipelineProgressCallback for Retries {
            fn on_retry(&self, attempt: u32, _max: u32, delay: Duration, _error: &str) {
                self.0.lock().unwrap().push((attempt, delay));
            }
        }

        let retries = Arc::new(Retries::default());
        let config = PipelineConfig::builder()
            .progress_callback(retries.clone())
            .build()
            .unwrap();
        let svc = Scripted::new(vec![busy(), busy(), Ok(RECORD.to_string())]);
        structure(&svc, "text", &config).await.unwrap();

        assert_eq!(
            *retries.0.lock().unwrap(),
            [(1, Duration::from_secs(1)), (2, Duration::from_secs(2))]
        );
    }
}

//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as a run moves from extraction to structuring to rendering, and
//! every time the structuring call backs off.
//!
//! # Example
//!
//! ```rust
//! use resume2tex::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Log;
//!
//! impl PipelineProgressCallback for Log {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("{}", stage.message());
//!     }
//!     fn on_retry(&self, attempt: u32, max_retries: u32, delay: Duration, _error: &str) {
//!         eprintln!("busy, retry {attempt}/{max_retries} in {delay:?}");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The pipeline stage currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    /// Reading the document and pulling out its text.
    Extracting,
    /// Waiting on the structuring service (including backoff).
    Structuring,
    /// Producing the LaTeX source.
    Rendering,
}

impl Stage {
    /// User-facing status line for the stage.
    pub fn message(self) -> &'static str {
        match self {
            Stage::Extracting => "Extracting text from file...",
            Stage::Structuring => "AI is restructuring your resume...",
            Stage::Rendering => "Generating LaTeX...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extracting => "extracting",
            Stage::Structuring => "structuring",
            Stage::Rendering => "rendering",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once when a run begins.
    fn on_run_start(&self, file_name: &str) {
        let _ = file_name;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called before sleeping between structuring attempts.
    ///
    /// # Arguments
    /// * `attempt`: 1-indexed number of the retry about to happen
    /// * `max_retries`: configured retry budget
    /// * `delay`: backoff about to be slept
    /// * `error`: message of the transient failure
    fn on_retry(&self, attempt: u32, max_retries: u32, delay: Duration, error: &str) {
        let _ = (attempt, max_retries, delay, error);
    }

    /// Called once after a successful run.
    fn on_run_complete(&self, elapsed: Duration) {
        let _ = elapsed;
    }

    /// Called once when a run fails.
    fn on_run_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(stage.to_string());
        }

        fn on_retry(&self, attempt: u32, _max: u32, delay: Duration, _error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("retry {attempt} {}ms", delay.as_millis()));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("cv.pdf");
        cb.on_stage_start(Stage::Extracting);
        cb.on_retry(1, 3, Duration::from_secs(1), "busy");
        cb.on_run_complete(Duration::from_millis(5));
        cb.on_run_error("boom");
    }

    #[test]
    fn recorder_receives_events_in_order() {
        let rec = Recorder::default();
        rec.on_stage_start(Stage::Extracting);
        rec.on_stage_start(Stage::Structuring);
        rec.on_retry(1, 3, Duration::from_secs(1), "busy");
        rec.on_stage_start(Stage::Rendering);
        assert_eq!(
            *rec.events.lock().unwrap(),
            ["extracting", "structuring", "retry 1 1000ms", "rendering"]
        );
    }

    #[test]
    fn stage_messages_are_distinct() {
        assert_ne!(Stage::Extracting.message(), Stage::Structuring.message());
        assert_ne!(Stage::Structuring.message(), Stage::Rendering.message());
    }
}

//! Pipeline entry points.
//!
//! [`Pipeline`] is the stateful API: it owns the structuring backend and an
//! optional [`ResumeStore`], refuses overlapping runs, and persists the result
//! of every successful run. The free functions ([`convert`],
//! [`convert_to_file`], [`convert_sync`], [`convert_from_bytes`]) are one-shot
//! wrappers for callers that only want a `.tex` out of a file.

use crate::cache::ResumeStore;
use crate::config::PipelineConfig;
use crate::error::ResumeError;
use crate::pipeline::input::{self, DocumentInput};
use crate::pipeline::{extract, render, structure};
use crate::progress::Stage;
use crate::record::{LatexDocument, ResumeRecord};
use crate::service::{resolve_service, StructuringService};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub record: ResumeRecord,
    pub latex: LatexDocument,
    pub stats: PipelineStats,
}

/// Timing and attempt counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Characters of extracted text sent for structuring.
    pub text_chars: usize,
    /// Structuring attempts made, including the successful one.
    pub attempts: u32,
    pub extract_duration_ms: u64,
    /// Includes backoff sleeps.
    pub structure_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Where a [`Pipeline`] currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Idle,
    Running(Stage),
    Completed,
    /// The last run failed with this message.
    Failed(String),
}

/// The resume pipeline: extract → structure → render → persist.
///
/// At most one run is in flight per pipeline; a second concurrent
/// [`Pipeline::run`] fails immediately with [`ResumeError::PipelineBusy`].
pub struct Pipeline {
    config: PipelineConfig,
    service: Arc<dyn StructuringService>,
    store: Option<Arc<dyn ResumeStore>>,
    running: AtomicBool,
    status: Mutex<PipelineStatus>,
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Pipeline {
    /// Build a pipeline, resolving the structuring backend from `config`.
    pub fn new(config: PipelineConfig) -> Result<Self, ResumeError> {
        let service = resolve_service(&config)?;
        Ok(Self::with_service(config, service))
    }

    /// Build a pipeline around an explicit backend.
    pub fn with_service(config: PipelineConfig, service: Arc<dyn StructuringService>) -> Self {
        Self {
            config,
            service,
            store: None,
            running: AtomicBool::new(false),
            status: Mutex::new(PipelineStatus::Idle),
        }
    }

    /// Persist successful runs to `store`.
    pub fn with_store(mut self, store: Arc<dyn ResumeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
            .lock()
            .map(|s| s.clone())
            .unwrap_or(PipelineStatus::Idle)
    }

    fn set_status(&self, status: PipelineStatus) {
        if let Ok(mut s) = self.status.lock() {
            *s = status;
        }
    }

    fn try_begin(&self) -> Result<RunGuard<'_>, ResumeError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ResumeError::PipelineBusy)?;
        Ok(RunGuard(&self.running))
    }

    /// The last persisted record and LaTeX, if any.
    pub fn restore(&self) -> Option<(ResumeRecord, LatexDocument)> {
        let restored = self.store.as_ref()?.load();
        if restored.is_some() {
            info!("Restored previous result from cache");
            self.set_status(PipelineStatus::Completed);
        }
        restored
    }

    /// Forget the persisted result and return to idle.
    pub fn reset(&self) -> Result<(), ResumeError> {
        if let Some(store) = &self.store {
            store.clear()?;
        }
        self.set_status(PipelineStatus::Idle);
        Ok(())
    }

    /// Resolve a path or URL, then [`run`](Self::run) it.
    pub async fn run_path(&self, input_str: &str) -> Result<PipelineOutput, ResumeError> {
        let document = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        self.run(document).await
    }

    /// Run the full pipeline on one document.
    pub async fn run(&self, document: DocumentInput) -> Result<PipelineOutput, ResumeError> {
        let _guard = self.try_begin()?;
        let cb = self.config.progress_callback.clone();
        if let Some(ref cb) = cb {
            cb.on_run_start(&document.file_name);
        }

        let total_start = Instant::now();
        match self.run_stages(&document).await {
            Ok(mut output) => {
                output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
                self.persist(&output);
                self.set_status(PipelineStatus::Completed);
                info!(
                    "Run complete: '{}' in {}ms ({} attempt(s))",
                    document.file_name, output.stats.total_duration_ms, output.stats.attempts
                );
                if let Some(ref cb) = cb {
                    cb.on_run_complete(total_start.elapsed());
                }
                Ok(output)
            }
            Err(e) => {
                error!("Run failed for '{}': {}", document.file_name, e);
                self.set_status(PipelineStatus::Failed(e.to_string()));
                if let Some(ref cb) = cb {
                    cb.on_run_error(&e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn run_stages(&self, document: &DocumentInput) -> Result<PipelineOutput, ResumeError> {
        // ── Step 1: Extract text ─────────────────────────────────────────────
        self.enter(Stage::Extracting);
        let extract_start = Instant::now();
        let text = extract::extract(document, &self.config).await?;
        if text.trim().is_empty() {
            return Err(ResumeError::Extraction {
                format: document.kind()?.label(),
                detail: "no extractable text (is it a scanned image?)".to_string(),
            });
        }
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

        // ── Step 2: Structure ────────────────────────────────────────────────
        self.enter(Stage::Structuring);
        let structured = structure::structure(self.service.as_ref(), &text, &self.config).await?;

        // ── Step 3: Render ───────────────────────────────────────────────────
        self.enter(Stage::Rendering);
        let render_start = Instant::now();
        let latex = render::render(&structured.record);
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        debug!("Rendered {} bytes of LaTeX", latex.as_str().len());

        Ok(PipelineOutput {
            record: structured.record,
            latex,
            stats: PipelineStats {
                text_chars: text.chars().count(),
                attempts: structured.attempts,
                extract_duration_ms,
                structure_duration_ms: structured.duration.as_millis() as u64,
                render_duration_ms,
                total_duration_ms: 0,
            },
        })
    }

    fn enter(&self, stage: Stage) {
        info!("{}", stage.message());
        self.set_status(PipelineStatus::Running(stage));
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    /// Cache failures never fail a run that produced a record.
    fn persist(&self, output: &PipelineOutput) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&output.record, &output.latex) {
                warn!("Could not cache result: {}", e);
            }
        }
    }
}

/// Convert a resume file or URL to LaTeX.
///
/// One-shot: nothing is cached.
///
/// # Errors
/// Input errors (not found, unsupported format), extraction failures, or a
/// [`ResumeError::Transform`] once structuring gives up.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, ResumeError> {
    Pipeline::new(config.clone())?
        .run_path(input_str.as_ref())
        .await
}

/// Convert in-memory bytes; the format is inferred from `file_name`.
pub async fn convert_from_bytes(
    bytes: &[u8],
    file_name: &str,
    config: &PipelineConfig,
) -> Result<PipelineOutput, ResumeError> {
    Pipeline::new(config.clone())?
        .run(DocumentInput::from_bytes(bytes, file_name))
        .await
}

/// Convert and write the LaTeX to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, ResumeError> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), output.latex.as_str()).await?;
    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<PipelineOutput, ResumeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ResumeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), ResumeError> {
    let write_err = |source| ResumeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

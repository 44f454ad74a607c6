//! CLI binary for resume2tex.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one document through the pipeline and writes the
//! LaTeX (or the structured record) out.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use resume2tex::{
    FileStore, Pipeline, PipelineConfig, PipelineOutput, PipelineProgressCallback,
    ProgressCallback, ResumeCache, ResumeRecord, ResumeStore, Stage,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// A single spinner whose message follows the pipeline stage; retries are
/// printed above it so the backoff schedule stays visible.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("resume2tex");
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, file_name: &str) {
        self.bar.println(format!("{} {}", bold("◆"), bold(file_name)));
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(stage.message());
    }

    fn on_retry(&self, attempt: u32, max_retries: u32, delay: Duration, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} AI model busy, retrying in {}ms... (Attempt {}/{})  {}",
            yellow("↻"),
            delay.as_millis(),
            attempt,
            max_retries,
            dim(&msg),
        ));
    }

    fn on_run_complete(&self, elapsed: Duration) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Resume converted in {}",
            green("✔"),
            dim(&format!("{:.1}s", elapsed.as_secs_f64()))
        );
    }

    fn on_run_error(&self, error: &str) {
        self.bar.finish_and_clear();
        let first_line = error.lines().next().unwrap_or(error);
        eprintln!("{} {}", red("✘"), red(first_line));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert to LaTeX on stdout
  resume2tex resume.pdf

  # Write Jane_Doe_Resume.tex into a directory
  resume2tex resume.docx -o out/

  # Keep the structured record as well
  resume2tex resume.pdf -o resume.tex --record resume.json

  # Print only the structured record
  resume2tex --json resume.pdf

  # Use another provider through edgequake-llm
  resume2tex --provider openai --model gpt-4.1-mini resume.pdf

  # Print the last successful result without calling the model
  resume2tex --restore

  # Forget the last result
  resume2tex --reset

RETRIES:
  When the model reports it is overloaded (HTTP 503, status UNAVAILABLE, or a
  "high demand" message) the call is retried with exponential backoff:
  1s, 2s, 4s for the default --max-retries 3 and --retry-delay-ms 1000.
  Other errors fail immediately.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key (--provider openai)
  ANTHROPIC_API_KEY       Anthropic API key (--provider anthropic)
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Override log filter, e.g. resume2tex=debug
"#;

/// Convert a PDF or DOCX resume into structured JSON and LaTeX.
#[derive(Parser, Debug)]
#[command(
    name = "resume2tex",
    version,
    about = "Convert a PDF or DOCX resume to ATS-friendly LaTeX using an LLM",
    long_about = "Extract the text of a PDF or DOCX resume, restructure it into a canonical \
record with a generative model (Gemini by default, or any edgequake-llm provider), and render \
it as a one-page LaTeX document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/DOCX path or HTTP/HTTPS URL.
    #[arg(required_unless_present_any = ["restore", "reset"])]
    input: Option<String>,

    /// Write LaTeX to this file, or into this directory as <Name>_Resume.tex.
    #[arg(short, long, env = "RESUME2TEX_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the structured record as JSON instead of LaTeX.
    #[arg(long)]
    json: bool,

    /// Also write the structured record as JSON to this file.
    #[arg(long, value_name = "PATH")]
    record: Option<PathBuf>,

    /// Model ID (default for Gemini: gemini-3-flash-preview).
    #[arg(long, env = "RESUME2TEX_MODEL")]
    model: Option<String>,

    /// Structuring provider: gemini (default), openai, anthropic, ollama, …
    #[arg(long, env = "RESUME2TEX_PROVIDER")]
    provider: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Retries on an overloaded model (0–10).
    #[arg(long, env = "RESUME2TEX_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Backoff before the first retry, doubled for each later one.
    #[arg(long, env = "RESUME2TEX_RETRY_DELAY_MS", default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Also retry when the model's answer is not a valid record.
    #[arg(long)]
    retry_malformed: bool,

    /// Per-attempt model call timeout in seconds.
    #[arg(long, env = "RESUME2TEX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "RESUME2TEX_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "RESUME2TEX_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Path to a text file with replacement instructions for the model.
    #[arg(long, value_name = "PATH")]
    instructions: Option<PathBuf>,

    /// Directory containing libpdfium.
    #[arg(long, value_name = "DIR")]
    pdfium_lib: Option<PathBuf>,

    /// Cache directory for the last successful result.
    #[arg(long, env = "RESUME2TEX_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Do not read or write the cache.
    #[arg(long, conflicts_with_all = ["restore", "reset"])]
    no_cache: bool,

    /// Print the cached result and exit without calling the model.
    #[arg(long, conflicts_with = "reset")]
    restore: bool,

    /// Clear the cached result and exit.
    #[arg(long)]
    reset: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "RESUME2TEX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RESUME2TEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RESUME2TEX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are suppressed while the spinner is active;
    // the spinner already shows the stage.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.restore && !cli.reset;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store: Option<Arc<dyn ResumeStore>> = if cli.no_cache {
        None
    } else {
        let dir = cli.cache_dir.clone().unwrap_or_else(FileStore::default_dir);
        Some(Arc::new(ResumeCache::new(FileStore::new(dir))))
    };

    // ── Cache-only modes ─────────────────────────────────────────────────
    if cli.reset {
        if let Some(ref store) = store {
            store.clear().context("Failed to clear cache")?;
        }
        if !cli.quiet {
            eprintln!("{} Cache cleared", green("✔"));
        }
        return Ok(());
    }

    if cli.restore {
        let (record, latex) = store
            .as_ref()
            .and_then(|s| s.load())
            .context("No cached resume found; run a conversion first")?;
        emit(&cli, &record, latex.as_str()).await?;
        return Ok(());
    }

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let mut pipeline = Pipeline::new(config).context("Failed to set up the structuring service")?;
    if let Some(store) = store {
        pipeline = pipeline.with_store(store);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let input = cli
        .input
        .as_deref()
        .context("An input file or URL is required")?;
    let output = pipeline.run_path(input).await.context("Conversion failed")?;

    emit(&cli, &output.record, output.latex.as_str()).await?;
    summarise(&cli, &output, show_progress);
    Ok(())
}

/// Write the requested artifacts: `.tex` file, record file, stdout.
async fn emit(cli: &Cli, record: &ResumeRecord, latex: &str) -> Result<()> {
    if let Some(ref path) = cli.record {
        let json = serde_json::to_string_pretty(record).context("Failed to serialise record")?;
        resume2tex::convert::write_atomic(path, &json)
            .await
            .with_context(|| format!("Failed to write record to {}", path.display()))?;
    }

    if let Some(ref output) = cli.output {
        let path = tex_path(output, record);
        resume2tex::convert::write_atomic(&path, latex)
            .await
            .with_context(|| format!("Failed to write LaTeX to {}", path.display()))?;
        if !cli.quiet {
            eprintln!("  {} {}", dim("→"), bold(&path.display().to_string()));
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(record).context("Failed to serialise record")?;
        println!("{json}");
    } else if cli.output.is_none() {
        write_latex(&mut io::stdout().lock(), latex).context("Failed to write to stdout")?;
    }
    Ok(())
}

/// `latex` followed by a newline if it lacks one.
fn write_latex(out: &mut impl Write, latex: &str) -> io::Result<()> {
    out.write_all(latex.as_bytes())?;
    if !latex.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// `-o` naming: an existing directory (or a path ending in a separator)
/// receives `<Name>_Resume.tex`; anything else is used as-is.
fn tex_path(output: &Path, record: &ResumeRecord) -> PathBuf {
    let looks_like_dir = output.is_dir()
        || output
            .to_str()
            .is_some_and(|s| s.ends_with('/') || s.ends_with(std::path::MAIN_SEPARATOR));
    if looks_like_dir {
        output.join(format!("{}.tex", record.file_stem()))
    } else {
        output.to_path_buf()
    }
}

fn summarise(cli: &Cli, output: &PipelineOutput, show_progress: bool) {
    if cli.quiet {
        return;
    }
    let s = &output.stats;
    if !show_progress {
        eprintln!(
            "Converted '{}' in {}ms ({} attempt(s))",
            output.record.name, s.total_duration_ms, s.attempts
        );
    } else {
        eprintln!(
            "   {} chars extracted  /  {} attempt(s)  /  {}ms structuring",
            dim(&s.text_chars.to_string()),
            dim(&s.attempts.to_string()),
            s.structure_duration_ms,
        );
    }
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .max_retries(cli.max_retries)
        .retry_base_delay_ms(cli.retry_delay_ms)
        .retry_malformed_output(cli.retry_malformed)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref path) = cli.instructions {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        builder = builder.instructions(text);
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

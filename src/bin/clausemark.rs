//! CLI binary for clausemark.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalyzerConfig`, runs the requested pipeline stage, and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clausemark::{
    apply_highlighting, animation_css, format_structured_text, AnalysisOutcome, AnalyzerConfig,
    DocumentProcessor, DynamicDocumentAnalyzer, HttpCompletionClient, ProcessedDocument,
    ProgressCallback, SessionStore, SharedOcr,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a single 0–100 bar driven by the extraction
/// stage's milestone percentages.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for CliProgress {
    fn on_progress(&self, percent: u8) {
        self.bar.set_position(percent as u64);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text and metadata as JSON
  clausemark extract contract.pdf

  # Run the full risk analysis (requires COMPLETION_API_KEY)
  clausemark analyze contract.pdf

  # Produce highlighted HTML
  clausemark annotate contract.pdf -o contract.html

  # Scanned documents go through OCR automatically
  clausemark extract scan.png

ENVIRONMENT VARIABLES:
  COMPLETION_API_KEY    API key for the completion endpoint
  COMPLETION_ENDPOINT   Chat-completions URL (default: OpenAI-compatible)
  PDFIUM_LIB_PATH       Path to an existing libpdfium

The `tesseract` binary must be on PATH for scanned inputs."#;

/// Analyze contracts and other documents for risk, with inline highlighting.
#[derive(Parser, Debug)]
#[command(
    name = "clausemark",
    version,
    about = "Analyze contracts and other documents for risk, with inline highlighting",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CLAUSEMARK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CLAUSEMARK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract text and metadata from a document, printed as JSON.
    Extract {
        /// PDF, DOCX, or image file.
        input: PathBuf,
    },
    /// Run the full risk analysis and print the result as JSON.
    Analyze {
        /// PDF, DOCX, or image file.
        input: PathBuf,

        /// Completion model ID.
        #[arg(long, env = "CLAUSEMARK_MODEL")]
        model: Option<String>,

        /// Completion request timeout in seconds.
        #[arg(long, env = "CLAUSEMARK_API_TIMEOUT", default_value_t = 60)]
        api_timeout: u64,
    },
    /// Produce a highlighted HTML rendition of the document.
    Annotate {
        /// PDF, DOCX, or image file.
        input: PathBuf,

        /// Write HTML to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Completion model ID.
        #[arg(long, env = "CLAUSEMARK_MODEL")]
        model: Option<String>,

        /// Completion request timeout in seconds.
        #[arg(long, env = "CLAUSEMARK_API_TIMEOUT", default_value_t = 60)]
        api_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Extract { input } => {
            let (document, _) = extract(&input, !cli.quiet, AnalyzerConfig::default()).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&document).context("Failed to serialise document")?
            );
        }
        Command::Analyze {
            input,
            model,
            api_timeout,
        } => {
            let config = build_config(model, api_timeout)?;
            let (document, file_name) = extract(&input, !cli.quiet, config.clone()).await?;
            let outcome = analyze(&document, &file_name, config).await?;
            report_provenance(&outcome, cli.quiet);
            println!(
                "{}",
                serde_json::to_string_pretty(outcome.result())
                    .context("Failed to serialise analysis")?
            );
        }
        Command::Annotate {
            input,
            output,
            model,
            api_timeout,
        } => {
            let config = build_config(model, api_timeout)?;
            let (document, file_name) = extract(&input, !cli.quiet, config.clone()).await?;
            let outcome = analyze(&document, &file_name, config.clone()).await?;
            report_provenance(&outcome, cli.quiet);
            let result = outcome.result();

            let body = apply_highlighting(
                &result.structured_text,
                &result.highlights,
                &result.visual_config.color_scheme,
            );
            let structure = document
                .structured
                .as_ref()
                .map(|s| {
                    format_structured_text(s, &result.visual_config.color_scheme, &config)
                })
                .unwrap_or_default();
            let html = format!(
                "{css}\n<article class=\"clausemark\">\n{body}\n</article>\n\
                 <aside class=\"clausemark-structure\">\n{structure}\n</aside>\n",
                css = animation_css(),
            );

            match output {
                Some(path) => {
                    tokio::fs::write(&path, html)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if !cli.quiet {
                        eprintln!(
                            "{} {} highlights → {}",
                            green("✔"),
                            bold(&result.highlights.len().to_string()),
                            bold(&path.display().to_string()),
                        );
                    }
                }
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    handle
                        .write_all(html.as_bytes())
                        .context("Failed to write to stdout")?;
                }
            }
        }
    }

    Ok(())
}

fn build_config(model: Option<String>, api_timeout: u64) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder().api_timeout_secs(api_timeout);
    if let Some(model) = model {
        builder = builder.model(model);
    }
    builder.build().context("Invalid configuration")
}

/// Run the extraction stage over a local file.
async fn extract(
    input: &Path,
    show_progress: bool,
    config: AnalyzerConfig,
) -> Result<(ProcessedDocument, String)> {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| input.display().to_string());
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let processor = DocumentProcessor::new(
        SharedOcr::tesseract(),
        Arc::new(SessionStore::new()),
        config,
    );

    let document = if show_progress {
        let progress = CliProgress::new();
        let result = processor
            .process(bytes, &file_name, &guess_mime(&file_name), None, progress.clone())
            .await;
        progress.finish();
        result
    } else {
        processor
            .process(
                bytes,
                &file_name,
                &guess_mime(&file_name),
                None,
                Arc::new(clausemark::NoopProgress),
            )
            .await
    }
    .with_context(|| format!("Failed to process {}", input.display()))?;

    Ok((document, file_name))
}

/// Run the analysis stage with the configured completion endpoint.
async fn analyze(
    document: &ProcessedDocument,
    file_name: &str,
    config: AnalyzerConfig,
) -> Result<AnalysisOutcome> {
    let endpoint = std::env::var("COMPLETION_ENDPOINT")
        .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
    let api_key = std::env::var("COMPLETION_API_KEY").unwrap_or_default();

    let client = HttpCompletionClient::new(endpoint, api_key, config.api_timeout_secs)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let analyzer = DynamicDocumentAnalyzer::new(Arc::new(client), config);
    Ok(analyzer.analyze_document(document, file_name).await)
}

fn report_provenance(outcome: &AnalysisOutcome, quiet: bool) {
    if quiet {
        return;
    }
    match outcome {
        AnalysisOutcome::Full(_) => {}
        AnalysisOutcome::Recovered(_) => {
            eprintln!(
                "{} analysis recovered from a malformed service response",
                cyan("⚠")
            );
        }
        AnalysisOutcome::Degraded(_, failure) => {
            eprintln!(
                "{} completion service unavailable ({}) — {} analysis",
                cyan("⚠"),
                dim(&failure.to_string()),
                bold("pattern-based")
            );
        }
    }
}

/// Best-effort MIME guess from the filename; the library falls back to the
/// extension anyway.
fn guess_mime(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".docx") {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".tif") || lower.ends_with(".tiff") {
        "image/tiff"
    } else {
        "application/octet-stream"
    }
    .to_string()
}

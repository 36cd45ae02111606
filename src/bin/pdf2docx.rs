//! CLI binary for pdf2docx.
//!
//! The presentation layer over [`pdf2docx::ConversionSession`]: it picks the
//! file, shows a spinner while the upload is in flight, then saves, opens or
//! discards the converted document.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2docx::{
    ConversionSession, FileCandidate, SessionConfig, SessionObserver, SessionState,
    SessionStatus, Severity, DEFAULT_ENDPOINT,
};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: prints each status line and spins while uploading.
struct CliObserver {
    spinner: Mutex<Option<ProgressBar>>,
    show_progress: bool,
}

impl CliObserver {
    fn new(show_progress: bool) -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(None),
            show_progress,
        })
    }

    fn start_spinner(&self) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(bar);
        }
    }

    fn stop_spinner(&self) {
        if let Some(bar) = self.spinner.lock().ok().and_then(|mut s| s.take()) {
            bar.finish_and_clear();
        }
    }
}

impl SessionObserver for CliObserver {
    fn on_state_change(&self, from: SessionState, to: SessionState) {
        if !self.show_progress {
            return;
        }
        if to == SessionState::Uploading {
            self.start_spinner();
        } else if from == SessionState::Uploading {
            self.stop_spinner();
        }
    }

    fn on_status(&self, status: &SessionStatus) {
        if !self.show_progress || status.message.is_empty() {
            return;
        }
        let line = match status.severity {
            Severity::Neutral => format!("{} {}", cyan("◆"), status.message),
            Severity::Success => format!("{} {}", green("✔"), bold(&status.message)),
            Severity::Error => format!("{} {}", red("✘"), red(&status.message)),
        };
        match self.spinner.lock().ok().and_then(|s| s.clone()) {
            Some(bar) => {
                bar.set_message(status.message.clone());
                bar.println(line);
            }
            None => eprintln!("{line}"),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert and save next to the current directory
  pdf2docx invoice.pdf

  # Save into a specific directory
  pdf2docx invoice.pdf -o ~/Documents/converted

  # Use another conversion service
  pdf2docx --endpoint http://127.0.0.1:9000/convert scan.pdf

  # Save and open the result in the default application
  pdf2docx --open report.pdf

  # Preview without keeping a copy (temporary file removed on exit)
  pdf2docx --discard --open report.pdf

  # Machine-readable summary
  pdf2docx --json report.pdf

ENVIRONMENT VARIABLES:
  PDF2DOCX_ENDPOINT       Conversion service URL
  PDF2DOCX_OUTPUT_DIR     Directory the document is saved to
  PDF2DOCX_TIMEOUT        Request timeout in seconds
  RUST_LOG                Override log filtering (e.g. pdf2docx=debug)
"#;

/// Convert a PDF to DOCX through a local conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2docx",
    version,
    about = "Convert a PDF to DOCX through a local conversion service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to convert.
    input: PathBuf,

    /// Directory the converted document is saved to.
    #[arg(short, long, env = "PDF2DOCX_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Conversion service URL.
    #[arg(long, env = "PDF2DOCX_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Multipart form field carrying the PDF.
    #[arg(long, env = "PDF2DOCX_FIELD", default_value = "file")]
    field_name: String,

    /// Request timeout in seconds (upload, conversion and download).
    #[arg(long, env = "PDF2DOCX_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Connect timeout in seconds.
    #[arg(long, env = "PDF2DOCX_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Open the converted document with the system's default application.
    #[arg(long)]
    open: bool,

    /// Do not save the converted document.
    #[arg(long)]
    discard: bool,

    /// Print a JSON summary on stdout.
    #[arg(long)]
    json: bool,

    /// Disable status lines and the spinner.
    #[arg(long, env = "PDF2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2DOCX_QUIET")]
    quiet: bool,
}

/// What `--json` prints.
#[derive(Debug, Serialize)]
struct Summary {
    input: PathBuf,
    name: String,
    size: u64,
    content_type: Option<String>,
    content_type_matches: bool,
    saved_to: Option<PathBuf>,
    status: SessionStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Status lines already tell the user what happens; library INFO logs
    // would only duplicate them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Session ──────────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let observer = CliObserver::new(show_progress);
    let mut session = ConversionSession::new(config)
        .context("Failed to start session")?
        .with_observer(observer);

    let candidate = FileCandidate::from_path(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    session.select_file(candidate).context("Input rejected")?;

    session.upload().await.context("Conversion failed")?;

    // ── Result actions ───────────────────────────────────────────────────
    let saved_to = if cli.discard {
        None
    } else {
        Some(
            session
                .save_result(&cli.output_dir)
                .await
                .context("Failed to save converted document")?,
        )
    };

    if cli.open {
        match &saved_to {
            Some(path) => {
                open::that(path).with_context(|| format!("Failed to open {}", path.display()))?
            }
            None => {
                let href = session.open_result()?.href().to_string();
                open::that(&href).with_context(|| format!("Failed to open {href}"))?;
                if !cli.quiet {
                    eprintln!(
                        "{}",
                        dim("Press Enter to remove the temporary copy and exit.")
                    );
                }
                let mut line = String::new();
                tokio::io::BufReader::new(tokio::io::stdin())
                    .read_line(&mut line)
                    .await
                    .context("Failed to read stdin")?;
            }
        }
    }

    if cli.json {
        let summary = match session.result() {
            Some(r) => Summary {
                input: cli.input.clone(),
                name: r.name().to_string(),
                size: r.size(),
                content_type: r.content_type().map(str::to_string),
                content_type_matches: r.content_type_matches(),
                saved_to: saved_to.clone(),
                status: session.status().clone(),
            },
            None => anyhow::bail!("Converted document vanished before the summary"),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if cli.quiet {
        if let Some(path) = &saved_to {
            println!("{}", path.display());
        }
    }

    session.discard_result();
    Ok(())
}

/// Map CLI args to `SessionConfig`.
fn build_config(cli: &Cli) -> Result<SessionConfig> {
    SessionConfig::builder()
        .endpoint(cli.endpoint.clone())
        .field_name(cli.field_name.clone())
        .request_timeout_secs(cli.timeout)
        .connect_timeout_secs(cli.connect_timeout)
        .build()
        .context("Invalid configuration")
}

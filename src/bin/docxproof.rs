//! CLI binary for docx-proof.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `CorrectionConfig`, runs one or more documents, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docx_proof::{
    check_oracle, correct_to_file, inspect, CorrectionConfig, CorrectionOutput,
    CorrectionProgressCallback, DocxProofError, ProgressCallback,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar plus a log line
/// per corrected paragraph and per image using [indicatif]. Paragraphs are
/// processed sequentially, so a single start timestamp is enough.
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Start time of the paragraph currently at the oracle.
    started: Mutex<Option<Instant>>,
    /// Count of paragraphs that kept their original text after errors.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_correction_start` (called once the document is parsed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_correction_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know the node count.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} nodes  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Correcting");
        self.bar.reset_eta();
    }

    fn paragraph_elapsed(&self) -> f64 {
        self.started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0) as f64
            / 1000.0
    }
}

impl CorrectionProgressCallback for CliProgressCallback {
    fn on_correction_start(&self, total_paragraphs: usize, total_images: usize) {
        // Switch from spinner-only style to full progress bar now that the
        // document is parsed; one tick per paragraph and per image.
        self.activate_bar(total_paragraphs + total_images);
        let images = if total_images > 0 {
            format!(" and {total_images} images")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Correcting {total_paragraphs} paragraphs{images}…"
            ))
        ));
    }

    fn on_paragraph_start(&self, index: usize, _total: usize) {
        *self.started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!("paragraph {}", index + 1));
    }

    fn on_paragraph_complete(&self, index: usize, total: usize, changed: bool) {
        let elapsed = self.paragraph_elapsed();
        // Unchanged and skipped paragraphs only tick the bar; a log line
        // per paragraph would bury the corrections in hundreds of rows.
        if changed {
            self.bar.println(format!(
                "  {} Paragraph {:>3}/{:<3}  corrected  {}",
                green("✓"),
                index + 1,
                total,
                dim(&format!("{elapsed:.1}s")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_paragraph_error(&self, index: usize, total: usize, error: &str) {
        let elapsed = self.paragraph_elapsed();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Char-based truncation: error text is frequently accented Portuguese.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Paragraph {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_complete(&self, index: usize, _total: usize, described: bool) {
        // Insertion runs back to front, so these lines count down.
        if described {
            self.bar
                .println(format!("  {} Image {:>2}  described", green("✓"), index + 1));
        } else {
            self.bar.println(format!(
                "  {} Image {:>2}  {}",
                cyan("⚠"),
                index + 1,
                cyan("placeholder inserted")
            ));
        }
        self.bar.inc(1);
    }

    fn on_correction_complete(&self, _total_paragraphs: usize, corrected: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} paragraphs corrected",
                green("✔"),
                bold(&corrected.to_string())
            );
        } else {
            eprintln!(
                "{} {} paragraphs corrected  ({} kept their original text after errors)",
                cyan("⚠"),
                bold(&corrected.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Correct a document (writes relatorio_corrigido.docx next to it)
  docxproof relatorio.docx

  # Choose the output name
  docxproof relatorio.docx -o revisado.docx

  # Correct several documents, three at a time
  docxproof cap1.docx cap2.docx cap3.docx cap4.docx -j 3

  # Use a specific model
  docxproof --model gpt-4.1 --provider openai relatorio.docx

  # Correct from a URL
  docxproof https://example.com/apostila.docx

  # Text only: skip image description paragraphs
  docxproof --no-images relatorio.docx

  # Inspect document structure (no API key needed)
  docxproof --inspect-only relatorio.docx

  # Is an oracle configured?
  docxproof --check

  # JSON report to stdout
  docxproof --json relatorio.docx > report.json

SUPPORTED PROVIDERS & MODELS:
  Provider     Model                       Input $/1M  Output $/1M  Vision
  ─────────    ──────────────────────────  ──────────  ───────────  ──────
  openai       gpt-4.1-nano (default)      $0.10       $0.40        ✓
  openai       gpt-4.1-mini                $0.40       $1.60        ✓
  openai       gpt-4.1                     $2.00       $8.00        ✓
  openai       gpt-4o                      $2.50       $10.00       ✓
  anthropic    claude-sonnet-4-20250514    $3.00       $15.00       ✓
  anthropic    claude-haiku-4-20250514     $0.80       $4.00        ✓
  gemini       gemini-2.0-flash            $0.10       $0.40        ✓
  gemini       gemini-2.5-pro              $1.25       $10.00       ✓
  ollama       llava, llama3.2-vision      free        free         ✓

  Image descriptions go to the same model, so keep a vision-capable one
  unless you pass --no-images.

COST ESTIMATE (30-page exercise booklet, ~200 paragraphs):
  ~120 input tokens/paragraph × 200 paragraphs = 24K input tokens
  ~100 output tokens/paragraph × 200 paragraphs = 20K output tokens

  gpt-4.1-nano:  ~$0.01 total
  gpt-4.1-mini:  ~$0.04 total
  gpt-4.1:       ~$0.21 total
  claude-sonnet-4-20250514: ~$0.37 total

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Correct:         docxproof relatorio.docx
"#;

/// Correct Word documents with an LLM while preserving their structure.
#[derive(Parser, Debug)]
#[command(
    name = "docxproof",
    version,
    about = "Correct the text of Word documents with an LLM, preserving structure",
    long_about = "Correct spelling, grammar, and redundancy in Word documents (local files or \
URLs) with an LLM, splicing the corrected text back into the original XML so styles, tables, \
images, and numbering survive untouched. Supports OpenAI, Anthropic, Google Gemini, Azure \
OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local docx file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "check")]
    inputs: Vec<String>,

    /// Write the corrected document here (single input only).
    ///
    /// Default: the input name with a `_corrigido` suffix.
    #[arg(short, long, env = "DOCXPROOF_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(
        long,
        env = "EDGEQUAKE_MODEL",
        long_help = "LLM model to use. Default: gpt-4.1-nano ($0.10/$0.40 per 1M tokens).\n\
          Popular choices: gpt-4.1-mini ($0.40/$1.60), gpt-4.1 ($2/$8), claude-sonnet-4-20250514 ($3/$15).\n\
          Must accept images unless --no-images is passed."
    )]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Documents processed concurrently in batch mode.
    #[arg(short = 'j', long, env = "DOCXPROOF_CONCURRENCY", default_value_t = 3)]
    concurrency: usize,

    /// Skip image annotation (no description paragraphs inserted).
    #[arg(long, env = "DOCXPROOF_NO_IMAGES")]
    no_images: bool,

    /// Keep oracle markup literal instead of turning it into bold/italic runs.
    #[arg(long, env = "DOCXPROOF_NO_MARKUP")]
    no_markup: bool,

    /// Disable the in-session correction cache.
    #[arg(long, env = "DOCXPROOF_NO_CACHE")]
    no_cache: bool,

    /// Path to a text file containing a custom correction system prompt.
    #[arg(long, env = "DOCXPROOF_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per paragraph.
    #[arg(long, env = "DOCXPROOF_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCXPROOF_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Retries per paragraph on LLM failure.
    #[arg(long, env = "DOCXPROOF_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Print the correction report as JSON instead of the summary.
    #[arg(long, env = "DOCXPROOF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCXPROOF_NO_PROGRESS")]
    no_progress: bool,

    /// Print document structure only, no correction (no API key needed).
    #[arg(long)]
    inspect_only: bool,

    /// Verify an oracle can be resolved, then exit.
    #[arg(long)]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCXPROOF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCXPROOF_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCXPROOF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
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

    // ── Readiness check ──────────────────────────────────────────────────
    if cli.check {
        let config = build_config(&cli, None).await?;
        return match check_oracle(&config) {
            Ok(()) => {
                println!("{} oracle ready", green("✔"));
                Ok(())
            }
            Err(e) => {
                eprintln!("{} {}", red("✘"), e);
                std::process::exit(1);
            }
        };
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut summaries = Vec::with_capacity(cli.inputs.len());
        for input in &cli.inputs {
            let summary = inspect(input)
                .await
                .with_context(|| format!("Failed to inspect {input}"))?;
            summaries.push((input, summary));
        }

        if cli.json {
            let entries: Vec<serde_json::Value> = summaries
                .iter()
                .map(|(input, s)| serde_json::json!({ "input": input, "summary": s }))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).context("Failed to serialise summaries")?
            );
        } else {
            for (input, s) in &summaries {
                println!("File:         {}", input);
                println!("Paragraphs:   {}", s.paragraphs);
                println!("Tables:       {}", s.tables);
                println!("Image runs:   {}", s.image_runs);
                println!("Media parts:  {}", s.media_parts);
                println!("Text length:  {} chars", s.text_chars);
                println!();
            }
        }
        return Ok(());
    }

    // ── Run correction ───────────────────────────────────────────────────
    if cli.inputs.len() == 1 {
        run_single(&cli, show_progress).await
    } else {
        if cli.output.is_some() {
            anyhow::bail!(
                "-o/--output applies to a single input; batch outputs use the _corrigido suffix"
            );
        }
        run_batch(&cli).await
    }
}

/// Correct one document, with the live per-paragraph progress bar.
async fn run_single(cli: &Cli, show_progress: bool) -> Result<()> {
    let input = &cli.inputs[0];

    // The progress bar starts as a spinner (no node count yet);
    // `on_correction_start` resizes it once the document is parsed.
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn CorrectionProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, progress_cb).await?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));

    let output = correct_to_file(input, &output_path, &config)
        .await
        .context("Correction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        println!("{json}");
    }

    if !cli.quiet {
        eprintln!(
            "{}  {}/{} paragraphs corrected  {} images described  {}ms  →  {}",
            if output.is_clean() {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.corrected,
            output.stats.total_paragraphs,
            output.stats.described_images,
            output.stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out  ({} cache hits)",
            dim(&output.stats.total_prompt_tokens.to_string()),
            dim(&output.stats.total_completion_tokens.to_string()),
            dim(&output.stats.cache_hits.to_string()),
        );
    }

    Ok(())
}

/// Correct several documents concurrently with a bounded worker pool.
///
/// Each document is written next to its source with the `_corrigido`
/// suffix. One fatal per-document error never stops the others; the exit
/// code reports whether any failed.
async fn run_batch(cli: &Cli) -> Result<()> {
    let config = build_config(cli, None).await?;
    let total = cli.inputs.len();

    let bar = if !cli.quiet && !cli.no_progress {
        let b = ProgressBar::new(total as u64);
        b.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>2}/{len} documents  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        b.set_prefix("Batch");
        b.enable_steady_tick(Duration::from_millis(80));
        Some(b)
    } else {
        None
    };

    type DocResult = (usize, String, PathBuf, Result<CorrectionOutput, DocxProofError>);
    let mut results: Vec<DocResult> =
        stream::iter(cli.inputs.iter().cloned().enumerate().map(|(pos, input)| {
            let config = config.clone();
            let bar = bar.clone();
            async move {
                let out_path = default_output_path(&input);
                let result = correct_to_file(&input, &out_path, &config).await;
                if let Some(ref b) = bar {
                    match &result {
                        Ok(o) => b.println(format!(
                            "  {} {}  {}/{} paragraphs  →  {}",
                            green("✓"),
                            input,
                            o.stats.corrected,
                            o.stats.total_paragraphs,
                            out_path.display()
                        )),
                        Err(e) => b.println(format!("  {} {}  {}", red("✗"), input, red(&e.to_string()))),
                    }
                    b.inc(1);
                }
                (pos, input, out_path, result)
            }
        }))
        .buffer_unordered(cli.concurrency.max(1))
        .collect()
        .await;

    if let Some(b) = bar {
        b.finish_and_clear();
    }

    // Completion order is arbitrary; report in input order.
    results.sort_by_key(|(pos, ..)| *pos);

    if cli.json {
        let entries: Vec<serde_json::Value> = results
            .iter()
            .map(|(_, input, out_path, result)| match result {
                Ok(output) => serde_json::json!({
                    "input": input,
                    "output": out_path.display().to_string(),
                    "report": output,
                }),
                Err(e) => serde_json::json!({
                    "input": input,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Failed to serialise reports")?
        );
    } else if !cli.quiet {
        eprintln!();
        eprintln!(
            "  {:<40} {:>10} {:>7}  {}",
            bold("Document"),
            bold("Corrected"),
            bold("Images"),
            bold("Result")
        );
        for (_, input, out_path, result) in &results {
            match result {
                Ok(o) => eprintln!(
                    "  {:<40} {:>10} {:>7}  {}",
                    input,
                    format!("{}/{}", o.stats.corrected, o.stats.total_paragraphs),
                    o.stats.described_images,
                    green(&out_path.display().to_string()),
                ),
                Err(e) => eprintln!("  {:<40} {:>10} {:>7}  {}", input, "—", "—", red(&e.to_string())),
            }
        }
        eprintln!();
    }

    let failed = results.iter().filter(|(.., r)| r.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{failed}/{total} documents failed");
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {} documents corrected",
            green("✔"),
            bold(&total.to_string())
        );
    }
    Ok(())
}

/// Map CLI args to `CorrectionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<CorrectionConfig> {
    let mut builder = CorrectionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .annotate_images(!cli.no_images)
        .apply_markup(!cli.no_markup)
        .use_cache(!cli.no_cache)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Default output path: the input name with a `_corrigido` suffix.
///
/// `relatorio.docx` → `relatorio_corrigido.docx`. URL inputs land in the
/// current directory under the URL's last path segment.
fn default_output_path(input: &str) -> PathBuf {
    let path = if input.starts_with("http://") || input.starts_with("https://") {
        PathBuf::from(docx_proof::pipeline::input::extract_filename(input))
    } else {
        PathBuf::from(input)
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("documento");
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("docx");
    path.with_file_name(format!("{stem}_corrigido.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_adds_the_suffix() {
        assert_eq!(
            default_output_path("relatorio.docx"),
            PathBuf::from("relatorio_corrigido.docx")
        );
        assert_eq!(
            default_output_path("pasta/apostila.docx"),
            PathBuf::from("pasta/apostila_corrigido.docx")
        );
    }

    #[test]
    fn default_output_for_urls_lands_in_cwd() {
        assert_eq!(
            default_output_path("https://example.com/docs/apostila.docx"),
            PathBuf::from("apostila_corrigido.docx")
        );
        assert_eq!(
            default_output_path("https://example.com/download"),
            PathBuf::from("downloaded_corrigido.docx")
        );
    }

    #[test]
    fn cli_parses_batch_inputs() {
        let cli = Cli::parse_from(["docxproof", "a.docx", "b.docx", "-j", "2"]);
        assert_eq!(cli.inputs, vec!["a.docx", "b.docx"]);
        assert_eq!(cli.concurrency, 2);
    }

    #[test]
    fn check_needs_no_inputs() {
        let cli = Cli::parse_from(["docxproof", "--check"]);
        assert!(cli.check);
        assert!(cli.inputs.is_empty());
    }
}

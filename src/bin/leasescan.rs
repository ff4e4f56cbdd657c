//! CLI binary for leasescan.
//!
//! A thin shim over the library crate that maps CLI flags to `AuditConfig`,
//! runs the audits and prints the reports.
//!
//! Exit codes: 0 every audit succeeded, 1 at least one audit failed,
//! 2 configuration error (nothing was audited).

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use leasescan::audit::write_atomic;
use leasescan::{
    inspect, preview_prompt, render_output, AuditClient, AuditConfig, AuditOutput,
    AuditProgressCallback, AuditStage, LeaseScanError, ProgressCallback, PromptLayout,
    ReportFormat, ValidationPolicy,
};
use std::collections::HashSet;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// Terminal progress: one spinner for the whole run plus a log line per
/// finished document. Audits may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    total: usize,
    done: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {pos}/{len}  {msg}  ⏱ {elapsed}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Auditing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            total,
            done: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl AuditProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, source: &str, stage: AuditStage) {
        self.bar.set_message(format!("{}  {}…", short_name(source), stage));
    }

    fn on_retry(&self, source: &str, attempt: u32, delay_ms: u64, error: &str) {
        self.bar.println(format!(
            "  {} {}  retry {} in {:.1}s  {}",
            yellow("↻"),
            short_name(source),
            attempt,
            delay_ms as f64 / 1000.0,
            dim(&truncate(error, 80)),
        ));
    }

    fn on_audit_complete(&self, source: &str, error: Option<&str>) {
        let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let line = match error {
            None => format!("  {} [{n}/{}] {}", green("✓"), self.total, source),
            Some(e) => format!(
                "  {} [{n}/{}] {}  {}",
                red("✗"),
                self.total,
                source,
                red(&truncate(e.lines().next().unwrap_or(e), 80)),
            ),
        };
        self.bar.println(line);
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Audit a lease (report on stdout)
  leasescan lease.pdf

  # Markdown report to a file
  leasescan lease.pdf --format markdown -o lease-audit.md

  # Several leases, two at a time, JSON reports into a directory
  leasescan a.pdf b.pdf c.pdf --concurrency 2 --format json -o audits/

  # Use another provider
  leasescan --provider openai --model gpt-4.1-mini lease.pdf

  # Audit a lease from a URL
  leasescan https://example.com/standard-lease.pdf

  # Check extraction only (no API key needed)
  leasescan --inspect-only lease.pdf

  # Show exactly what would be sent to the model
  leasescan --print-prompt lease.pdf

  # Reject out-of-range scores and unknown severity labels
  leasescan --no-clamp --strict-levels lease.pdf

SCORING:
  The model scores a lease from 0 to 100 (100 = most tenant-friendly).
  Below 70 the status is "Review Required"; 70 and above is "Safe".
  Only the first 10,000 characters of the lease are analysed.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  MISTRAL_API_KEY         Mistral API key
  OPENROUTER_API_KEY      OpenRouter API key
  LEASESCAN_PROVIDER      Provider (gemini, openai, anthropic, mistral, ollama, …)
  LEASESCAN_MODEL         Model ID
  PDFIUM_LIB_PATH         Path to libpdfium if not on the library search path
  RUST_LOG                Override log filtering (e.g. leasescan=debug)

EXIT CODES:
  0  every audit succeeded
  1  at least one audit failed
  2  configuration error (missing API key, bad flag); nothing was audited
"#;

/// Audit residential lease PDFs for tenant-hostile clauses.
#[derive(Parser, Debug)]
#[command(
    name = "leasescan",
    version,
    about = "Audit residential lease PDFs for tenant-hostile clauses using an LLM",
    long_about = "Extract the text of a lease PDF (local file or URL), ask a language model to \
flag predatory, illegal or highly unusual clauses, and print a safety score, a status and the \
list of red flags. Supports Google Gemini (default), OpenAI, Anthropic, Mistral, OpenRouter \
and local Ollama models.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the report to this file (a directory when auditing several inputs).
    #[arg(short, long, env = "LEASESCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// Report format.
    #[arg(long, env = "LEASESCAN_FORMAT", value_enum, default_value = "text")]
    format: FormatArg,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "LEASESCAN_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, mistral, openrouter, ollama.
    #[arg(long, env = "LEASESCAN_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "LEASESCAN_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max tokens the model may generate.
    #[arg(long, env = "LEASESCAN_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Retries when the model service is unavailable.
    #[arg(long, env = "LEASESCAN_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "LEASESCAN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "LEASESCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// How the lease text is sent: separated (own message) or inline.
    #[arg(long, env = "LEASESCAN_LAYOUT", value_enum, default_value = "separated")]
    layout: LayoutArg,

    /// Reject severity levels other than HIGH, MED and LOW.
    #[arg(long, env = "LEASESCAN_STRICT_LEVELS")]
    strict_levels: bool,

    /// Reject scores outside 0–100 instead of clamping them.
    #[arg(long, env = "LEASESCAN_NO_CLAMP")]
    no_clamp: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "LEASESCAN_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the built-in audit instructions.
    #[arg(long, env = "LEASESCAN_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Number of documents audited at once.
    #[arg(short, long, env = "LEASESCAN_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print extraction facts only; no model call, no API key needed.
    #[arg(long)]
    inspect_only: bool,

    /// Print the prompt that would be sent; no model call.
    #[arg(long)]
    print_prompt: bool,

    /// Disable progress output.
    #[arg(long, env = "LEASESCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LEASESCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except reports and errors.
    #[arg(short, long, env = "LEASESCAN_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Text,
    Markdown,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Text => ReportFormat::Text,
            FormatArg::Markdown => ReportFormat::Markdown,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Separated,
    Inline,
}

impl From<LayoutArg> for PromptLayout {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::Separated => PromptLayout::Separated,
            LayoutArg::Inline => PromptLayout::Inline,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless asked for.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.inspect_only
        && !cli.print_prompt
        && cli.format != FormatArg::Json;
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

    match run(cli, show_progress).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::from(2)
        }
    }
}

/// `Err` means a configuration problem; per-document failures are reported
/// inline and turn into exit code 1.
async fn run(cli: Cli, show_progress: bool) -> Result<ExitCode> {
    let progress = show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as ProgressCallback),
    )
    .await?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut failed = 0;
        for input in &cli.inputs {
            match inspect(input, &config).await {
                Ok(info) if cli.format == FormatArg::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&info)
                            .context("Failed to serialise document info")?
                    );
                }
                Ok(info) => {
                    println!("File:         {}", info.source);
                    println!("Pages:        {}", info.page_count);
                    println!("Characters:   {}", info.extracted_chars);
                    println!(
                        "Analysed:     {}{}",
                        info.excerpt_chars,
                        if info.truncated { " (truncated)" } else { "" }
                    );
                    if info.extracted_chars == 0 {
                        println!("Warning:      no text layer; the lease cannot be audited");
                    }
                }
                Err(e) => {
                    failed += 1;
                    report_failure(input, &e);
                }
            }
        }
        return Ok(exit_code(failed));
    }

    // ── Prompt preview ───────────────────────────────────────────────────
    if cli.print_prompt {
        let mut failed = 0;
        for input in &cli.inputs {
            match preview_prompt(input, &config).await {
                Ok(prompt) => {
                    if let Some(ref system) = prompt.instructions {
                        println!("{}\n{}\n", dim("── system ──"), system);
                    }
                    println!("{}\n{}", dim("── user ──"), prompt.user);
                }
                Err(e) => {
                    failed += 1;
                    report_failure(input, &e);
                }
            }
        }
        return Ok(exit_code(failed));
    }

    // ── Audit ────────────────────────────────────────────────────────────
    let client = AuditClient::from_config(config).context("Configuration error")?;
    let results = client.audit_many(&cli.inputs).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }

    let format = ReportFormat::from(cli.format);
    let multiple = cli.inputs.len() > 1;
    let mut failed = 0;
    let mut used_names = HashSet::new();

    for (source, result) in results {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                failed += 1;
                report_failure(&source, &e);
                continue;
            }
        };

        if !cli.quiet {
            for warning in &output.warnings {
                eprintln!("  {} {}: {}", yellow("⚠"), source, warning);
            }
        }

        match cli.output {
            Some(ref path) => {
                let target = if multiple {
                    report_path(path, &source, format, &mut used_names)
                } else {
                    path.clone()
                };
                let rendered = match render_output(&output, format, false) {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        failed += 1;
                        report_failure(&source, &e);
                        continue;
                    }
                };
                if let Err(e) = write_atomic(&target, &rendered).await {
                    failed += 1;
                    report_failure(&source, &e);
                    continue;
                }
                if !cli.quiet {
                    eprintln!(
                        "{}  {}/100  →  {}",
                        green("✔"),
                        output.report.score,
                        bold(&target.display().to_string())
                    );
                }
            }
            None => {
                if let Err(e) = print_report(&output, format, multiple) {
                    failed += 1;
                    eprintln!("{} {}  {:#}", red("✗"), bold(&source), e);
                    continue;
                }
            }
        }

        if !cli.quiet && format != ReportFormat::Json {
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {}ms total",
                dim(&output.stats.input_tokens.to_string()),
                dim(&output.stats.output_tokens.to_string()),
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(exit_code(failed))
}

/// Map CLI args to `AuditConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AuditConfig> {
    let mut builder = AuditConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .prompt_layout(cli.layout.into())
        .validation(ValidationPolicy {
            clamp_score: !cli.no_clamp,
            strict_levels: cli.strict_levels,
        })
        .concurrency(cli.concurrency);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref path) = cli.instructions {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        builder = builder.instructions(text);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_report(output: &AuditOutput, format: ReportFormat, multiple: bool) -> Result<()> {
    let color = format == ReportFormat::Text && io::stdout().is_terminal();
    let rendered = render_output(output, format, color)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if multiple && format == ReportFormat::Text {
        writeln!(handle, "{}", bold(&output.document.source)).context("Failed to write to stdout")?;
    }
    handle
        .write_all(rendered.as_bytes())
        .context("Failed to write to stdout")?;
    if multiple {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn report_failure(source: &str, e: &LeaseScanError) {
    eprintln!("{} {}  {}", red("✗"), bold(source), red(e.user_message()));
    for line in e.to_string().lines() {
        eprintln!("   {}", line);
    }
    if let Some(raw) = e.raw_response() {
        eprintln!("   {}", dim("raw response:"));
        for line in raw.lines() {
            eprintln!("   {}", dim(line));
        }
    }
}

fn exit_code(failed: usize) -> ExitCode {
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// `<dir>/<input stem>.<format extension>` for multi-input runs.
///
/// Query strings and fragments are dropped, characters outside
/// `[A-Za-z0-9._-]` become `_`, and a repeated stem gets a `-2`, `-3`, ...
/// suffix so no two inputs share a report file.
fn report_path(
    dir: &Path,
    source: &str,
    format: ReportFormat,
    used: &mut HashSet<String>,
) -> PathBuf {
    let without_query = source.split(['?', '#']).next().unwrap_or(source);
    let name = short_name(without_query);
    let name = name
        .strip_suffix(".pdf")
        .or_else(|| name.strip_suffix(".PDF"))
        .unwrap_or(name);
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = match stem.trim_matches('.') {
        "" => "lease".to_string(),
        s => s.to_string(),
    };

    let mut candidate = stem.clone();
    let mut n = 2;
    while !used.insert(candidate.to_ascii_lowercase()) {
        candidate = format!("{stem}-{n}");
        n += 1;
    }

    let ext = match format {
        ReportFormat::Text => "txt",
        ReportFormat::Markdown => "md",
        ReportFormat::Json => "json",
    };
    dir.join(format!("{candidate}.{ext}"))
}

/// Last path or URL segment.
fn short_name(source: &str) -> &str {
    source
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source)
}

fn truncate(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}\u{2026}")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_file_name_in_different_dirs_gets_distinct_reports() {
        let mut used = HashSet::new();
        let out = Path::new("out");
        let a = report_path(out, "a/lease.pdf", ReportFormat::Json, &mut used);
        let b = report_path(out, "b/lease.pdf", ReportFormat::Json, &mut used);
        let c = report_path(out, "c/LEASE.PDF", ReportFormat::Json, &mut used);
        assert_eq!(a, out.join("lease.json"));
        assert_eq!(b, out.join("lease-2.json"));
        assert_eq!(c, out.join("LEASE-3.json"));
    }

    #[test]
    fn url_query_is_dropped_from_report_name() {
        let mut used = HashSet::new();
        let path = report_path(
            Path::new("out"),
            "https://x.test/get?id=lease.pdf",
            ReportFormat::Json,
            &mut used,
        );
        assert_eq!(path, Path::new("out").join("get.json"));
    }

    #[test]
    fn unsafe_characters_are_replaced() {
        let mut used = HashSet::new();
        let path = report_path(
            Path::new("out"),
            "https://x.test/my%20lease:v2.pdf",
            ReportFormat::Markdown,
            &mut used,
        );
        assert_eq!(path, Path::new("out").join("my_20lease_v2.md"));

        let path = report_path(Path::new("out"), "https://x.test/", ReportFormat::Text, &mut used);
        assert_eq!(path, Path::new("out").join("x.test.txt"));
    }
}

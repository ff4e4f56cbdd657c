//! Audit entry points.
//!
//! [`AuditClient`] owns one resolved model client and one [`AuditConfig`],
//! and runs the pipeline for any number of documents:
//!
//! ```text
//! input ─► extract ─► prompt ─► model ─► normalize ─► validate ─► AuditOutput
//! ```
//!
//! The free functions ([`audit`], [`audit_many`], [`audit_to_file`], …)
//! build a client from the config on each call, which is what the CLI and
//! most library users want. Build an [`AuditClient`] yourself to resolve the
//! provider once, or to plug in a custom [`ModelClient`].

use crate::config::{credential_env_var, default_model_for, AuditConfig, DEFAULT_PROVIDER};
use crate::error::LeaseScanError;
use crate::output::{AuditOutput, AuditStats, DocumentInfo};
use crate::pipeline::extract::{self, ExtractedText};
use crate::pipeline::llm::{self, LlmModelClient, ModelClient};
use crate::pipeline::{input, normalize, validate};
use crate::progress::AuditStage;
use crate::prompts::{self, AuditPrompt, MAX_EXCERPT_CHARS};
use crate::render::{render_output, ReportFormat};
use edgequake_llm::ProviderFactory;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Environment variable naming the provider when the config doesn't.
pub const PROVIDER_ENV: &str = "LEASESCAN_PROVIDER";
/// Model paired with [`PROVIDER_ENV`].
pub const MODEL_ENV: &str = "LEASESCAN_MODEL";

// ── Provider resolution ──────────────────────────────────────────────────

/// A provider/model pair picked from config and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderChoice {
    pub provider: String,
    pub model: String,
}

/// Pick the provider and model, from most-specific to least-specific:
///
/// 1. `config.provider_name` (with `config.model` or the provider default)
/// 2. `LEASESCAN_PROVIDER` + optional `LEASESCAN_MODEL`
/// 3. [`DEFAULT_PROVIDER`] and its default model
///
/// `config.model` always wins over an environment model.
pub fn choose_provider(
    config: &AuditConfig,
    env_provider: Option<&str>,
    env_model: Option<&str>,
) -> Result<ProviderChoice, LeaseScanError> {
    fn nonblank(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }

    let (provider, env_model) = match nonblank(config.provider_name.as_deref()) {
        Some(name) => (name.to_ascii_lowercase(), None),
        None => match nonblank(env_provider) {
            Some(name) => (name.to_ascii_lowercase(), nonblank(env_model)),
            None => (DEFAULT_PROVIDER.to_string(), None),
        },
    };

    let model = nonblank(config.model.as_deref())
        .or(env_model)
        .or_else(|| default_model_for(&provider))
        .ok_or_else(|| {
            LeaseScanError::InvalidConfig(format!(
                "No default model for provider '{provider}'; set a model explicitly"
            ))
        })?
        .to_string();

    Ok(ProviderChoice { provider, model })
}

/// Fail fast when `provider` needs an API key that is not set.
pub fn check_credential(provider: &str) -> Result<(), LeaseScanError> {
    let Some(env_var) = credential_env_var(provider) else {
        return Ok(());
    };
    match std::env::var(env_var) {
        Ok(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(LeaseScanError::MissingCredential {
            provider: provider.to_string(),
            env_var: env_var.to_string(),
        }),
    }
}

/// Build the production model client for `config`.
///
/// A pre-built `config.provider` is used as-is, with no credential check.
pub fn resolve_client(config: &AuditConfig) -> Result<LlmModelClient, LeaseScanError> {
    if let Some(ref provider) = config.provider {
        let label = config
            .provider_name
            .clone()
            .unwrap_or_else(|| "custom".to_string());
        return Ok(LlmModelClient::new(Arc::clone(provider), label, config));
    }

    let env_provider = std::env::var(PROVIDER_ENV).ok();
    let env_model = std::env::var(MODEL_ENV).ok();
    let choice = choose_provider(config, env_provider.as_deref(), env_model.as_deref())?;

    check_credential(&choice.provider)?;

    let provider = ProviderFactory::create_llm_provider(&choice.provider, &choice.model)
        .map_err(|e| LeaseScanError::ProviderNotConfigured {
            provider: choice.provider.clone(),
            hint: format!("{e}"),
        })?;

    info!("Using provider '{}' with model '{}'", choice.provider, choice.model);
    Ok(LlmModelClient::new(provider, choice.provider, config))
}

// ── Client ───────────────────────────────────────────────────────────────

/// A model client plus the config every audit it runs will use.
pub struct AuditClient<C = LlmModelClient> {
    model: C,
    config: AuditConfig,
}

impl AuditClient<LlmModelClient> {
    /// Resolve the provider and check its credential.
    ///
    /// Configuration errors surface here, before any document is read.
    pub fn from_config(config: AuditConfig) -> Result<Self, LeaseScanError> {
        let model = resolve_client(&config)?;
        Ok(Self { model, config })
    }
}

impl<C: ModelClient> AuditClient<C> {
    pub fn with_model(model: C, config: AuditConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn model(&self) -> &C {
        &self.model
    }

    /// Audit a PDF given as a local path or an HTTP(S) URL.
    pub async fn audit(&self, input_str: &str) -> Result<AuditOutput, LeaseScanError> {
        let start = Instant::now();
        info!("Starting audit: {}", input_str);
        let result = self.run_input(input_str, start).await;
        self.finish(input_str, result)
    }

    /// Audit PDF bytes already in memory. `source` labels logs and output.
    pub async fn audit_bytes(
        &self,
        bytes: Vec<u8>,
        source: &str,
    ) -> Result<AuditOutput, LeaseScanError> {
        let start = Instant::now();
        let result = match input::ensure_pdf(source, &bytes) {
            Ok(()) => self.run_bytes(bytes, source, start).await,
            Err(e) => Err(e),
        };
        self.finish(source, result)
    }

    /// Audit lease text that was extracted elsewhere.
    pub async fn audit_text(&self, text: &str, source: &str) -> Result<AuditOutput, LeaseScanError> {
        let start = Instant::now();
        let result = if text.trim().is_empty() {
            Err(LeaseScanError::NoExtractableText {
                source_name: source.to_string(),
                page_count: 0,
            })
        } else {
            let document = document_info(source, text, 0);
            self.analyze(text, document, AuditStats::default(), start).await
        };
        self.finish(source, result)
    }

    /// Audit several documents, up to `config.concurrency` at once.
    ///
    /// Results come back in input order. One failure never stops the others.
    pub async fn audit_many<S: AsRef<str>>(
        &self,
        inputs: &[S],
    ) -> Vec<(String, Result<AuditOutput, LeaseScanError>)> {
        let concurrency = self.config.concurrency.max(1);
        debug!("Auditing {} documents, concurrency {}", inputs.len(), concurrency);

        let mut results: Vec<(usize, String, Result<AuditOutput, LeaseScanError>)> =
            stream::iter(inputs.iter().enumerate().map(|(idx, item)| async move {
                let item = item.as_ref();
                (idx, item.to_string(), self.audit(item).await)
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_by_key(|(idx, _, _)| *idx);
        results
            .into_iter()
            .map(|(_, source, result)| (source, result))
            .collect()
    }

    // ── Stages ───────────────────────────────────────────────────────────

    async fn run_input(&self, input_str: &str, start: Instant) -> Result<AuditOutput, LeaseScanError> {
        let t = self.stage_start(input_str, AuditStage::Input);
        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        self.stage_complete(input_str, AuditStage::Input, t);

        self.run_bytes(resolved.bytes, input_str, start).await
    }

    async fn run_bytes(
        &self,
        bytes: Vec<u8>,
        source: &str,
        start: Instant,
    ) -> Result<AuditOutput, LeaseScanError> {
        let t = self.stage_start(source, AuditStage::Extract);
        let extracted = extract::extract_text(source, bytes, self.config.password.as_deref()).await?;
        let extract_duration_ms = self.stage_complete(source, AuditStage::Extract, t);

        let document = document_info(source, &extracted.text, extracted.page_count);
        let stats = AuditStats {
            extract_duration_ms,
            ..Default::default()
        };
        self.analyze(&extracted.text, document, stats, start).await
    }

    async fn analyze(
        &self,
        text: &str,
        document: DocumentInfo,
        mut stats: AuditStats,
        start: Instant,
    ) -> Result<AuditOutput, LeaseScanError> {
        let source = document.source.as_str();
        if document.truncated {
            debug!(
                "{}: sending first {} of {} chars",
                source, document.excerpt_chars, document.extracted_chars
            );
        }

        // ── Prompt + model ───────────────────────────────────────────────
        let t = self.stage_start(source, AuditStage::Analyze);
        let prompt = prompts::audit_prompt(
            text,
            self.config.instructions.as_deref(),
            self.config.prompt_layout,
        );
        let call = llm::call_model(&self.model, &prompt, &self.config, source).await?;
        self.stage_complete(source, AuditStage::Analyze, t);

        // ── Normalize + validate ─────────────────────────────────────────
        let t = self.stage_start(source, AuditStage::Validate);
        let candidate = normalize::normalize_response(&call.reply.content);
        let validated = validate::validate_response(&candidate, &self.config.validation)?;
        self.stage_complete(source, AuditStage::Validate, t);

        stats.input_tokens = call.reply.prompt_tokens;
        stats.output_tokens = call.reply.completion_tokens;
        stats.model_attempts = call.attempts;
        stats.model_duration_ms = call.duration_ms;
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Audit complete: {} scored {}/100 with {} flags ({}ms)",
            source,
            validated.report.score,
            validated.report.flags.len(),
            stats.total_duration_ms
        );

        Ok(AuditOutput {
            report: validated.report,
            warnings: validated.warnings,
            document,
            stats,
        })
    }

    fn stage_start(&self, source: &str, stage: AuditStage) -> Instant {
        debug!("{}: {} started", source, stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(source, stage);
        }
        Instant::now()
    }

    fn stage_complete(&self, source: &str, stage: AuditStage, started: Instant) -> u64 {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(source, stage, elapsed_ms);
        }
        elapsed_ms
    }

    fn finish(
        &self,
        source: &str,
        result: Result<AuditOutput, LeaseScanError>,
    ) -> Result<AuditOutput, LeaseScanError> {
        if let Err(ref e) = result {
            warn!("Audit failed for {}: {}", source, e);
        }
        if let Some(ref cb) = self.config.progress_callback {
            let message = result.as_ref().err().map(|e| e.to_string());
            cb.on_audit_complete(source, message.as_deref());
        }
        result
    }
}

/// Document facts for `text` as it will be excerpted.
pub fn document_info(source: &str, text: &str, page_count: usize) -> DocumentInfo {
    let extracted_chars = text.chars().count();
    DocumentInfo {
        source: source.to_string(),
        page_count,
        extracted_chars,
        excerpt_chars: extracted_chars.min(MAX_EXCERPT_CHARS),
        truncated: extracted_chars > MAX_EXCERPT_CHARS,
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Audit a lease PDF (local path or URL).
///
/// # Example
/// ```rust,no_run
/// use leasescan::{audit, AuditConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = audit("lease.pdf", &AuditConfig::default()).await?;
/// println!("{}/100, {} flags", output.report.score, output.report.flags.len());
/// # Ok(())
/// # }
/// ```
pub async fn audit(
    input_str: impl AsRef<str>,
    config: &AuditConfig,
) -> Result<AuditOutput, LeaseScanError> {
    AuditClient::from_config(config.clone())?
        .audit(input_str.as_ref())
        .await
}

/// Audit PDF bytes held in memory.
pub async fn audit_bytes(
    bytes: &[u8],
    source: &str,
    config: &AuditConfig,
) -> Result<AuditOutput, LeaseScanError> {
    AuditClient::from_config(config.clone())?
        .audit_bytes(bytes.to_vec(), source)
        .await
}

/// Audit several documents concurrently.
///
/// The outer `Err` is a configuration error that stopped every audit; the
/// inner results are per document.
pub async fn audit_many<S: AsRef<str>>(
    inputs: &[S],
    config: &AuditConfig,
) -> Result<Vec<(String, Result<AuditOutput, LeaseScanError>)>, LeaseScanError> {
    let client = AuditClient::from_config(config.clone())?;
    Ok(client.audit_many(inputs).await)
}

/// Audit a document and write the rendered report to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn audit_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    format: ReportFormat,
    config: &AuditConfig,
) -> Result<AuditOutput, LeaseScanError> {
    let output = audit(input_str, config).await?;
    let rendered = render_output(&output, format, false)?;
    write_atomic(output_path.as_ref(), &rendered).await?;
    Ok(output)
}

/// Synchronous wrapper around [`audit`].
///
/// Creates a temporary tokio runtime internally.
pub fn audit_sync(
    input_str: impl AsRef<str>,
    config: &AuditConfig,
) -> Result<AuditOutput, LeaseScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| LeaseScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(audit(input_str, config))
}

/// Extract a document and report what would be sent, without a model call.
///
/// Does not require an LLM provider or API key. A document with no text
/// layer reports zero characters instead of failing.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &AuditConfig,
) -> Result<DocumentInfo, LeaseScanError> {
    let source = input_str.as_ref();
    match load_text(source, config).await {
        Ok(extracted) => Ok(document_info(source, &extracted.text, extracted.page_count)),
        Err(LeaseScanError::NoExtractableText { page_count, .. }) => {
            Ok(document_info(source, "", page_count))
        }
        Err(e) => Err(e),
    }
}

/// The exact prompt an audit of `input_str` would send.
pub async fn preview_prompt(
    input_str: impl AsRef<str>,
    config: &AuditConfig,
) -> Result<AuditPrompt, LeaseScanError> {
    let extracted = load_text(input_str.as_ref(), config).await?;
    Ok(prompts::audit_prompt(
        &extracted.text,
        config.instructions.as_deref(),
        config.prompt_layout,
    ))
}

async fn load_text(source: &str, config: &AuditConfig) -> Result<ExtractedText, LeaseScanError> {
    let resolved = input::resolve_input(source, config.download_timeout_secs).await?;
    extract::extract_text(source, resolved.bytes, config.password.as_deref()).await
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), LeaseScanError> {
    let write_err = |e| LeaseScanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = tmp_path_for(path);
    let result = match tokio::fs::write(&tmp_path, contents).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "report".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuditConfig {
        AuditConfig::default()
    }

    #[test]
    fn default_provider_when_nothing_set() {
        let choice = choose_provider(&config(), None, None).unwrap();
        assert_eq!(choice.provider, "gemini");
        assert_eq!(choice.model, "gemini-2.5-flash");
    }

    #[test]
    fn config_provider_beats_environment() {
        let c = AuditConfig::builder().provider_name("OpenAI").build().unwrap();
        let choice = choose_provider(&c, Some("anthropic"), Some("claude-x")).unwrap();
        assert_eq!(choice.provider, "openai");
        assert_eq!(choice.model, "gpt-4.1-mini");
    }

    #[test]
    fn environment_pair_is_used() {
        let choice = choose_provider(&config(), Some("ollama"), Some("qwen3")).unwrap();
        assert_eq!(
            choice,
            ProviderChoice {
                provider: "ollama".into(),
                model: "qwen3".into()
            }
        );

        let choice = choose_provider(&config(), Some("ollama"), Some("  ")).unwrap();
        assert_eq!(choice.model, "llama3.2");
    }

    #[test]
    fn config_model_wins() {
        let c = AuditConfig::builder().model("gemini-2.5-pro").build().unwrap();
        let choice = choose_provider(&c, Some("gemini"), Some("gemini-2.0-flash")).unwrap();
        assert_eq!(choice.model, "gemini-2.5-pro");
    }

    #[test]
    fn unknown_provider_needs_a_model() {
        let c = AuditConfig::builder().provider_name("lmstudio").build().unwrap();
        let err = choose_provider(&c, None, None).unwrap_err();
        assert!(matches!(err, LeaseScanError::InvalidConfig(_)));
    }

    #[test]
    fn local_providers_need_no_credential() {
        assert!(check_credential("ollama").is_ok());
        assert!(check_credential("mock").is_ok());
    }

    #[test]
    fn document_info_tracks_truncation() {
        let short = document_info("a.pdf", "Rent is due monthly.", 2);
        assert_eq!(short.extracted_chars, 20);
        assert_eq!(short.excerpt_chars, 20);
        assert!(!short.truncated);

        let long_text = "é".repeat(MAX_EXCERPT_CHARS + 5);
        let long = document_info("b.pdf", &long_text, 30);
        assert_eq!(long.extracted_chars, MAX_EXCERPT_CHARS + 5);
        assert_eq!(long.excerpt_chars, MAX_EXCERPT_CHARS);
        assert!(long.truncated);
    }

    #[test]
    fn tmp_path_is_a_sibling() {
        assert_eq!(
            tmp_path_for(Path::new("out/report.md")),
            PathBuf::from("out/report.md.tmp")
        );
    }

    #[tokio::test]
    async fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        write_atomic(&path, "{}\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
        assert!(!tmp_path_for(&path).exists());
    }

    #[tokio::test]
    async fn write_atomic_failure_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the target makes the rename fail.
        let path = dir.path().join("report.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = write_atomic(&path, "{}\n").await.unwrap_err();
        assert!(matches!(err, LeaseScanError::OutputWriteFailed { .. }));
        assert!(!tmp_path_for(&path).exists());
        assert!(path.join("keep").exists());
    }
}

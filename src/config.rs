//! Configuration types for lease audits.
//!
//! All audit behaviour is controlled through [`AuditConfig`], built via its
//! [`AuditConfigBuilder`]. The config is plain data: it is cloned into each
//! audit and never mutated once built, so concurrent audits can share one.

use crate::error::LeaseScanError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Provider used when neither the config nor the environment names one.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used with [`DEFAULT_PROVIDER`].
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for a lease audit.
///
/// # Example
/// ```rust
/// use leasescan::{AuditConfig, ValidationPolicy};
///
/// let config = AuditConfig::builder()
///     .provider_name("gemini")
///     .model("gemini-2.5-flash")
///     .api_timeout_secs(30)
///     .validation(ValidationPolicy::strict())
///     .build()
///     .unwrap();
/// assert_eq!(config.api_timeout_secs, 30);
/// ```
#[derive(Clone)]
pub struct AuditConfig {
    /// LLM model identifier. If None, the provider's default is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    /// If None, `LEASESCAN_PROVIDER` or [`DEFAULT_PROVIDER`] is used.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// The same lease should get the same score on a re-run; low temperature
    /// keeps the model close to deterministic.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    ///
    /// A report with a dozen flags is well under 1 000 tokens. Too low a
    /// limit truncates the JSON mid-object, which surfaces as a malformed
    /// response.
    pub max_tokens: usize,

    /// Retries after a `ModelUnavailable` failure. Default: 2.
    ///
    /// Timeouts and invalid responses are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-model-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Replacement for the built-in audit instructions.
    pub instructions: Option<String>,

    /// How instructions and document text are sent to the model.
    pub prompt_layout: PromptLayout,

    /// How strictly the model's JSON is checked.
    pub validation: ValidationPolicy,

    /// Audits run at once by [`crate::audit::audit_many`]. Default: 4.
    pub concurrency: usize,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            password: None,
            instructions: None,
            prompt_layout: PromptLayout::default(),
            validation: ValidationPolicy::default(),
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("custom_instructions", &self.instructions.is_some())
            .field("prompt_layout", &self.prompt_layout)
            .field("validation", &self.validation)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl AuditConfig {
    /// Create a new builder for `AuditConfig`.
    pub fn builder() -> AuditConfigBuilder {
        AuditConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AuditConfig`].
#[derive(Debug)]
pub struct AuditConfigBuilder {
    config: AuditConfig,
}

impl AuditConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
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

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
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

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = Some(text.into());
        self
    }

    pub fn prompt_layout(mut self, layout: PromptLayout) -> Self {
        self.config.prompt_layout = layout;
        self
    }

    pub fn validation(mut self, policy: ValidationPolicy) -> Self {
        self.config.validation = policy;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AuditConfig, LeaseScanError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(LeaseScanError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(LeaseScanError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref text) = c.instructions {
            if text.trim().is_empty() {
                return Err(LeaseScanError::InvalidConfig(
                    "Custom instructions must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the audit instructions and the lease text reach the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PromptLayout {
    /// Instructions as a system message; the lease excerpt as a separate,
    /// delimited user message. (default)
    ///
    /// Keeping the document out of the instruction text makes it harder for
    /// wording inside the lease to pass itself off as instructions.
    #[default]
    Separated,
    /// One user message holding instructions and excerpt together.
    Inline,
}

/// Validation strictness for model responses.
///
/// The default tolerates the two deviations models commonly produce (scores
/// outside 0–100 and made-up severity labels) and reports them as
/// [`crate::output::DataQualityWarning`]s. [`ValidationPolicy::strict`]
/// turns both into schema violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Clamp out-of-range scores into 0–100 instead of rejecting them.
    pub clamp_score: bool,
    /// Reject flag levels other than HIGH/MED/LOW.
    pub strict_levels: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            clamp_score: true,
            strict_levels: false,
        }
    }
}

impl ValidationPolicy {
    pub fn strict() -> Self {
        Self {
            clamp_score: false,
            strict_levels: true,
        }
    }
}

// ── Provider helpers ─────────────────────────────────────────────────────

/// Environment variable holding the API key for `provider`.
///
/// Returns `None` for local providers that need no credential.
pub fn credential_env_var(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "xai" => Some("XAI_API_KEY"),
        _ => None,
    }
}

/// Model used for `provider` when none is configured.
pub fn default_model_for(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some(DEFAULT_MODEL),
        "openai" => Some("gpt-4.1-mini"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "mistral" => Some("mistral-small-latest"),
        "ollama" => Some("llama3.2"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AuditConfig::default();
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.max_retries, 2);
        assert_eq!(c.prompt_layout, PromptLayout::Separated);
        assert!(c.validation.clamp_score);
        assert!(!c.validation.strict_levels);
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = AuditConfig::builder()
            .temperature(9.0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);

        let err = AuditConfig::builder().api_timeout_secs(0).build();
        assert!(matches!(err, Err(LeaseScanError::InvalidConfig(_))));

        let err = AuditConfig::builder().instructions("   ").build();
        assert!(matches!(err, Err(LeaseScanError::InvalidConfig(_))));
    }

    #[test]
    fn debug_redacts_password() {
        let c = AuditConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn credential_lookup() {
        assert_eq!(credential_env_var("gemini"), Some("GEMINI_API_KEY"));
        assert_eq!(credential_env_var("OpenAI"), Some("OPENAI_API_KEY"));
        assert_eq!(credential_env_var("ollama"), None);
        assert_eq!(default_model_for("gemini"), Some(DEFAULT_MODEL));
        assert_eq!(default_model_for("something-else"), None);
    }
}

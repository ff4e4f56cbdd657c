//! Model interaction: send the audit prompt and get back raw completion text.
//!
//! The model is an external oracle behind the [`ModelClient`] trait.
//! [`LlmModelClient`] is the production implementation over
//! `edgequake-llm`; tests substitute scripted clients. The text that comes
//! back is untrusted and goes through [`crate::pipeline::normalize`] and
//! [`crate::pipeline::validate`] before anything uses it.
//!
//! ## Time budget and retries
//!
//! Every call runs under `tokio::time::timeout(api_timeout_secs)`, so a hung
//! provider can never block an audit indefinitely. Only
//! [`ModelCallError::Unavailable`] is retried, with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). A timeout has already spent the whole
//! budget and is surfaced immediately.

use crate::config::AuditConfig;
use crate::error::LeaseScanError;
use crate::prompts::AuditPrompt;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Raw completion plus token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Failure reported by a [`ModelClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelCallError {
    /// Network, auth, rate-limit, or provider-side failure.
    #[error("{0}")]
    Unavailable(String),
    /// The client gave up waiting on its own.
    #[error("request timed out")]
    Timeout,
}

/// A source of completions for audit prompts.
pub trait ModelClient: Send + Sync {
    /// Provider label for logs and errors.
    fn provider_name(&self) -> &str;

    /// Send one prompt and return the raw completion.
    fn complete(
        &self,
        prompt: &AuditPrompt,
    ) -> impl Future<Output = Result<ModelReply, ModelCallError>> + Send;
}

/// [`ModelClient`] backed by an `edgequake-llm` provider.
#[derive(Clone)]
pub struct LlmModelClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmModelClient {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &AuditConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for LlmModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmModelClient")
            .field("label", &self.label)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ModelClient for LlmModelClient {
    fn provider_name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, prompt: &AuditPrompt) -> Result<ModelReply, ModelCallError> {
        let messages = build_messages(prompt);
        let options = self.options();

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelCallError::Unavailable(e.to_string()))?;

        Ok(ModelReply {
            content: response.content,
            prompt_tokens: response.prompt_tokens as usize,
            completion_tokens: response.completion_tokens as usize,
        })
    }
}

/// Lay the prompt out as chat messages.
///
/// Separated layout: a system message with the instructions, then a user
/// message with the delimited document. Inline layout: one user message.
pub fn build_messages(prompt: &AuditPrompt) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(ref instructions) = prompt.instructions {
        messages.push(ChatMessage::system(instructions.as_str()));
    }
    messages.push(ChatMessage::user(prompt.user.as_str()));
    messages
}

/// A completed model call.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub reply: ModelReply,
    /// Calls made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Call the model under the configured timeout, retrying transient failures.
///
/// `source` names the document for logs and progress events.
pub async fn call_model<C: ModelClient>(
    client: &C,
    prompt: &AuditPrompt,
    config: &AuditConfig,
    source: &str,
) -> Result<ModelCall, LeaseScanError> {
    let start = Instant::now();
    let budget = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            let detail = last_err.as_deref().unwrap_or("unknown error");
            warn!(
                "{}: retry {}/{} after {}ms",
                source, attempt, config.max_retries, backoff
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_retry(source, attempt, backoff, detail);
            }
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(budget, client.complete(prompt)).await {
            Ok(Ok(reply)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    "{}: model replied in {}ms ({} chars)",
                    source,
                    duration_ms,
                    reply.content.len()
                );
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    source, reply.prompt_tokens, reply.completion_tokens
                );
                return Ok(ModelCall {
                    reply,
                    attempts: attempt + 1,
                    duration_ms,
                });
            }
            Ok(Err(ModelCallError::Unavailable(detail))) => {
                warn!("{}: attempt {} failed: {}", source, attempt + 1, detail);
                last_err = Some(detail);
            }
            Ok(Err(ModelCallError::Timeout)) | Err(_) => {
                warn!(
                    "{}: model call exceeded {}s budget",
                    source, config.api_timeout_secs
                );
                return Err(LeaseScanError::ModelTimeout {
                    secs: config.api_timeout_secs,
                });
            }
        }
    }

    Err(LeaseScanError::ModelUnavailable {
        provider: client.provider_name().to_string(),
        attempts: config.max_retries + 1,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(1u64 << (attempt - 1).min(16))
}

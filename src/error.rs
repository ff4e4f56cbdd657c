//! Error types for the leasescan library.
//!
//! Two error types reflect two layers of the pipeline:
//!
//! * [`ResponseError`]: what the validator returns when a model completion
//!   cannot be turned into a [`crate::output::LeaseAuditReport`]. It is a
//!   closed sum type (malformed vs. schema violation) so every caller handles
//!   both outcomes explicitly.
//!
//! * [`LeaseScanError`]: every failure an audit can end in, from an
//!   unreadable file to a missing API key. Each variant maps to an
//!   [`ErrorCategory`] and a short user-facing message so front-ends can
//!   report failures without inspecting variants themselves.

use std::path::PathBuf;
use thiserror::Error;

/// Longest raw-response excerpt embedded in a `Display` message.
///
/// The full text is always available through [`LeaseScanError::raw_response`].
const RAW_PREVIEW_CHARS: usize = 200;

/// A model completion that could not be validated into a report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// The candidate text is not a JSON object at all.
    #[error("Response is not valid JSON ({detail}): {}", preview(.raw))]
    Malformed { raw: String, detail: String },

    /// The text parsed, but a required field is missing or has the wrong type.
    #[error("Response field '{field}' {reason}")]
    SchemaViolation {
        field: String,
        reason: String,
        raw: String,
    },
}

impl ResponseError {
    /// The raw candidate text that failed validation.
    pub fn raw(&self) -> &str {
        match self {
            ResponseError::Malformed { raw, .. } | ResponseError::SchemaViolation { raw, .. } => {
                raw
            }
        }
    }
}

/// All errors returned by the leasescan library.
#[derive(Debug, Error)]
pub enum LeaseScanError {
    // ── Input / extraction errors ─────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Lease file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("Input is not a valid PDF: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    /// PDF requires a password but none (or the wrong one) was provided.
    #[error("PDF '{source_name}' is encrypted.\nProvide the password with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// pdfium could not open or read the document.
    #[error("Could not extract text from '{source_name}': {detail}")]
    ExtractionFailed { source_name: String, detail: String },

    /// The document opened but has no text layer (e.g. a scanned image).
    #[error("'{source_name}' contains no extractable text ({page_count} pages).\nScanned leases must be OCR'd first.")]
    NoExtractableText {
        source_name: String,
        page_count: usize,
    },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model call failed (network, auth, rate limit, provider error).
    #[error("Model provider '{provider}' unavailable after {attempts} attempt(s): {detail}")]
    ModelUnavailable {
        provider: String,
        attempts: u32,
        detail: String,
    },

    /// The model call exceeded the configured time budget.
    #[error("Model call timed out after {secs}s")]
    ModelTimeout { secs: u64 },

    // ── Response validation errors ────────────────────────────────────────
    /// The completion was not parseable as JSON.
    #[error("Model returned a malformed response ({detail}): {}", preview(.raw))]
    MalformedResponse { raw: String, detail: String },

    /// The completion parsed but does not match the report schema.
    #[error("Model response violates the report schema: '{field}' {reason}")]
    SchemaViolation {
        field: String,
        reason: String,
        raw: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The configured provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The credential the provider needs is absent from the environment.
    #[error("Missing API key for provider '{provider}'.\nSet {env_var} before starting leasescan.")]
    MissingCredential { provider: String, env_var: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the rendered report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse grouping of [`LeaseScanError`] variants for user-facing reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The document could not be read or had no text.
    Extraction,
    /// The model service failed or timed out.
    ModelService,
    /// The model answered, but not with a valid report.
    Response,
    /// Startup configuration is wrong; fatal.
    Configuration,
    /// The rendered report could not be written.
    Output,
    Internal,
}

impl LeaseScanError {
    /// Which part of the pipeline failed.
    pub fn category(&self) -> ErrorCategory {
        use LeaseScanError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | InvalidInput { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | NotAPdf { .. }
            | PasswordRequired { .. }
            | ExtractionFailed { .. }
            | NoExtractableText { .. } => ErrorCategory::Extraction,
            ModelUnavailable { .. } | ModelTimeout { .. } => ErrorCategory::ModelService,
            MalformedResponse { .. } | SchemaViolation { .. } => ErrorCategory::Response,
            ProviderNotConfigured { .. } | MissingCredential { .. } | InvalidConfig(_) => {
                ErrorCategory::Configuration
            }
            OutputWriteFailed { .. } => ErrorCategory::Output,
            Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Short message suitable for showing an end user.
    pub fn user_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Extraction => "Could not read file",
            ErrorCategory::ModelService => "Analysis service unavailable",
            ErrorCategory::Response => "The analysis response could not be understood",
            ErrorCategory::Configuration => "leasescan is not configured correctly",
            ErrorCategory::Output => "Could not write the report",
            ErrorCategory::Internal => "Unexpected internal error",
        }
    }

    /// The raw model output behind a response error, for diagnostics.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            LeaseScanError::MalformedResponse { raw, .. }
            | LeaseScanError::SchemaViolation { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// True for failures where re-running the same audit may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LeaseScanError::ModelUnavailable { .. } | LeaseScanError::ModelTimeout { .. }
        )
    }

    /// True for errors that must stop the process before any audit runs.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

impl From<ResponseError> for LeaseScanError {
    fn from(e: ResponseError) -> Self {
        match e {
            ResponseError::Malformed { raw, detail } => {
                LeaseScanError::MalformedResponse { raw, detail }
            }
            ResponseError::SchemaViolation { field, reason, raw } => {
                LeaseScanError::SchemaViolation { field, reason, raw }
            }
        }
    }
}

fn preview(raw: &str) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(RAW_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head:?}\u{2026}")
    } else {
        format!("{head:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display_includes_raw_text() {
        let e = LeaseScanError::MalformedResponse {
            raw: "I cannot analyze this document.".into(),
            detail: "expected value at line 1 column 1".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("I cannot analyze"), "got: {msg}");
        assert_eq!(e.raw_response(), Some("I cannot analyze this document."));
    }

    #[test]
    fn long_raw_text_is_previewed() {
        let raw = "x".repeat(1000);
        let e = ResponseError::Malformed {
            raw: raw.clone(),
            detail: "eof".into(),
        };
        let msg = e.to_string();
        assert!(msg.len() < 400, "got {} bytes", msg.len());
        assert!(msg.ends_with('\u{2026}'));
        assert_eq!(e.raw(), raw);
    }

    #[test]
    fn schema_violation_names_field() {
        let e: LeaseScanError = ResponseError::SchemaViolation {
            field: "flags".into(),
            reason: "is missing".into(),
            raw: "{}".into(),
        }
        .into();
        assert!(e.to_string().contains("'flags'"));
        assert_eq!(e.category(), ErrorCategory::Response);
        assert_eq!(e.raw_response(), Some("{}"));
    }

    #[test]
    fn categories_and_user_messages() {
        let e = LeaseScanError::NotAPdf {
            source_name: "lease.docx".into(),
            magic: b"PK\x03\x04".to_vec(),
        };
        assert_eq!(e.category(), ErrorCategory::Extraction);
        assert_eq!(e.user_message(), "Could not read file");
        assert!(!e.is_retryable());

        let e = LeaseScanError::ModelTimeout { secs: 60 };
        assert_eq!(e.user_message(), "Analysis service unavailable");
        assert!(e.is_retryable());
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn missing_credential_is_fatal() {
        let e = LeaseScanError::MissingCredential {
            provider: "gemini".into(),
            env_var: "GEMINI_API_KEY".into(),
        };
        assert!(e.is_fatal());
        assert!(e.to_string().contains("GEMINI_API_KEY"));

        let e = LeaseScanError::ModelUnavailable {
            provider: "gemini".into(),
            attempts: 3,
            detail: "503".into(),
        };
        assert!(!e.is_fatal());
    }
}

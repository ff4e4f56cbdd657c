//! # leasescan
//!
//! Audit residential lease PDFs for tenant-hostile clauses with an LLM.
//!
//! The crate's job is the contract between raw document text and a report
//! that is safe to show: build a deterministic prompt, call the model under
//! a time budget, then treat whatever comes back as untrusted. The
//! completion is unwrapped from code fences, parsed, and checked field by
//! field before it becomes a [`LeaseAuditReport`]. Anything that does not
//! check out is an explicit error carrying the raw text, never a partially
//! filled report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Extract    page text via pdfium (spawn_blocking)
//!  ├─ 3. Prompt     instructions + first 10,000 chars of the lease
//!  ├─ 4. Model      gemini / openai / anthropic / ollama / …
//!  ├─ 5. Normalize  strip ```json fences
//!  ├─ 6. Validate   JSON → LeaseAuditReport (+ data-quality warnings)
//!  └─ 7. Render     score card, status, flag list
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use leasescan::{audit, render_text, AuditConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Defaults to gemini-2.5-flash; needs GEMINI_API_KEY
//!     let config = AuditConfig::default();
//!     let output = audit("lease.pdf", &config).await?;
//!     print!("{}", render_text(&output.report, false));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `leasescan` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! leasescan = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod audit;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use audit::{
    audit, audit_bytes, audit_many, audit_sync, audit_to_file, inspect, preview_prompt,
    AuditClient,
};
pub use config::{AuditConfig, AuditConfigBuilder, PromptLayout, ValidationPolicy};
pub use error::{ErrorCategory, LeaseScanError, ResponseError};
pub use output::{
    AuditOutput, AuditStats, DataQualityWarning, DocumentInfo, Flag, LeaseAuditReport, Severity,
};
pub use pipeline::llm::{LlmModelClient, ModelCallError, ModelClient, ModelReply};
pub use pipeline::normalize::normalize_response;
pub use pipeline::validate::{validate_response, ValidatedReport};
pub use progress::{AuditProgressCallback, AuditStage, NoopProgressCallback, ProgressCallback};
pub use prompts::{build_prompt, AuditPrompt};
pub use render::{render_markdown, render_output, render_text, AuditStatus, ReportFormat, ReportView};

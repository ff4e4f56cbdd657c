//! Progress-callback trait for audit stage events.
//!
//! Inject an [`Arc<dyn AuditProgressCallback>`] via
//! [`crate::config::AuditConfigBuilder::progress_callback`] to be told when
//! each pipeline stage starts and finishes. The CLI uses this to drive a
//! spinner; a server could forward the events to a websocket.
//!
//! # Example
//!
//! ```rust
//! use leasescan::{AuditConfig, AuditProgressCallback, AuditStage};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl AuditProgressCallback for Log {
//!     fn on_stage_start(&self, source: &str, stage: AuditStage) {
//!         eprintln!("{source}: {}", stage.label());
//!     }
//! }
//!
//! let config = AuditConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stages reported to a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditStage {
    /// Reading the file or downloading the URL.
    Input,
    /// Pulling text out of the PDF.
    Extract,
    /// Waiting for the model.
    Analyze,
    /// Normalising and validating the response.
    Validate,
}

impl AuditStage {
    pub fn label(self) -> &'static str {
        match self {
            AuditStage::Input => "Reading document",
            AuditStage::Extract => "Extracting text",
            AuditStage::Analyze => "Analyzing",
            AuditStage::Validate => "Validating response",
        }
    }
}

impl fmt::Display for AuditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the audit pipeline as it moves through its stages.
///
/// Implementations must be `Send + Sync`: [`crate::audit::audit_many`] runs
/// several audits concurrently against one callback. All methods default to
/// no-ops. `source` identifies the document so concurrent audits can be told
/// apart.
pub trait AuditProgressCallback: Send + Sync {
    /// A stage is about to begin.
    fn on_stage_start(&self, source: &str, stage: AuditStage) {
        let _ = (source, stage);
    }

    /// A stage finished successfully after `elapsed_ms`.
    fn on_stage_complete(&self, source: &str, stage: AuditStage, elapsed_ms: u64) {
        let _ = (source, stage, elapsed_ms);
    }

    /// A model call failed transiently and will be retried after `delay_ms`.
    fn on_retry(&self, source: &str, attempt: u32, delay_ms: u64, error: &str) {
        let _ = (source, attempt, delay_ms, error);
    }

    /// The audit ended. `error` is `None` on success.
    fn on_audit_complete(&self, source: &str, error: Option<&str>) {
        let _ = (source, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AuditProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AuditConfig`].
pub type ProgressCallback = Arc<dyn AuditProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl AuditProgressCallback for Recorder {
        fn on_stage_start(&self, source: &str, stage: AuditStage) {
            self.events.lock().unwrap().push(format!("{source}:start:{stage:?}"));
        }

        fn on_retry(&self, _source: &str, attempt: u32, _delay_ms: u64, _error: &str) {
            self.events.lock().unwrap().push(format!("retry:{attempt}"));
        }

        fn on_audit_complete(&self, source: &str, error: Option<&str>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{source}:done:{}", error.is_none()));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start("a.pdf", AuditStage::Input);
        cb.on_stage_complete("a.pdf", AuditStage::Input, 3);
        cb.on_retry("a.pdf", 1, 500, "503");
        cb.on_audit_complete("a.pdf", Some("boom"));
    }

    #[test]
    fn recorder_receives_events_in_order() {
        let rec = Recorder::default();
        rec.on_stage_start("lease.pdf", AuditStage::Analyze);
        rec.on_retry("lease.pdf", 1, 500, "rate limited");
        rec.on_audit_complete("lease.pdf", None);
        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["lease.pdf:start:Analyze", "retry:1", "lease.pdf:done:true"]
        );
    }

    #[test]
    fn stage_labels() {
        assert_eq!(AuditStage::Analyze.to_string(), "Analyzing");
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start("x", AuditStage::Extract);
    }
}

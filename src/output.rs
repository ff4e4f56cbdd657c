//! Output types: the validated report and everything reported alongside it.
//!
//! [`LeaseAuditReport`] serialises to exactly the JSON shape the model is
//! asked to produce, so a report can be written out and read back through
//! [`crate::pipeline::validate`] unchanged. Data-quality findings, document
//! facts, and timing live beside it in [`AuditOutput`], never inside it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Scores below this value mark the lease as needing review.
pub const REVIEW_THRESHOLD: i64 = 70;

/// Inclusive bounds of the safety score.
pub const SCORE_MIN: i64 = 0;
pub const SCORE_MAX: i64 = 100;

/// A validated risk assessment of one lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseAuditReport {
    /// 0–100; 100 is the most tenant-favourable.
    pub score: i64,
    /// One-sentence overview of the lease.
    pub summary: String,
    /// Flagged clauses in model order. Empty for a clean lease.
    pub flags: Vec<Flag>,
}

/// One risky clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Short label, e.g. "Automatic renewal".
    pub issue: String,
    /// Why the clause is a risk for the tenant.
    pub risk: String,
    pub level: Severity,
}

impl LeaseAuditReport {
    pub fn high_flag_count(&self) -> usize {
        self.flags.iter().filter(|f| f.level.is_high()).count()
    }
}

/// Severity the model assigned to a flag.
///
/// Only the exact labels `HIGH`, `MED` and `LOW` are known. Anything else,
/// including other spellings such as `high` or `MEDIUM`, is kept verbatim in
/// [`Severity::Other`] so it is displayed as the model wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    High,
    Med,
    Low,
    Other(String),
}

impl Severity {
    /// Parse a model-supplied level. Matching is exact.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "HIGH" => Severity::High,
            "MED" => Severity::Med,
            "LOW" => Severity::Low,
            _ => Severity::Other(raw.to_string()),
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Severity::High)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Severity::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::High => "HIGH",
            Severity::Med => "MED",
            Severity::Low => "LOW",
            Severity::Other(s) => s,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Severity::parse(&s))
    }
}

/// A tolerated deviation found while validating a model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// The score was outside 0–100 and was clamped.
    ScoreClamped { original: i64, clamped: i64 },
    /// A flag used a level other than HIGH/MED/LOW.
    UnrecognizedLevel { index: usize, value: String },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::ScoreClamped { original, clamped } => {
                write!(f, "score {original} is out of range; clamped to {clamped}")
            }
            DataQualityWarning::UnrecognizedLevel { index, value } => {
                write!(f, "flag {} has unrecognized level {value:?}", index + 1)
            }
        }
    }
}

/// Facts about the extracted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Where the document came from (path, URL, or caller-supplied label).
    pub source: String,
    pub page_count: usize,
    /// Characters of text extracted across all pages.
    pub extracted_chars: usize,
    /// Characters actually sent to the model.
    pub excerpt_chars: usize,
    /// True when the excerpt is shorter than the extracted text.
    pub truncated: bool,
}

/// Token usage and timing for one audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Model calls made, including retries.
    pub model_attempts: u32,
    pub extract_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful audit produces.
#[derive(Debug, Clone, Serialize)]
pub struct AuditOutput {
    pub report: LeaseAuditReport,
    pub warnings: Vec<DataQualityWarning>,
    pub document: DocumentInfo,
    pub stats: AuditStats,
}

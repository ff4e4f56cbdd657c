//! Response validation: candidate JSON → [`LeaseAuditReport`].
//!
//! The model is an untrusted source. Instead of deserialising straight into
//! the report struct (which would either accept too much or fail with an
//! opaque serde message), the candidate is decoded into a generic
//! [`serde_json::Value`] and checked field by field, so a failure names the
//! exact path that was wrong (`flags[2].level`).
//!
//! Outcomes are a closed set: a [`ValidatedReport`], or a
//! [`ResponseError::Malformed`] / [`ResponseError::SchemaViolation`].
//! Nothing partially valid is ever returned.

use crate::config::ValidationPolicy;
use crate::error::ResponseError;
use crate::output::{DataQualityWarning, Flag, LeaseAuditReport, Severity, SCORE_MAX, SCORE_MIN};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A report that passed validation, plus any tolerated deviations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedReport {
    pub report: LeaseAuditReport,
    pub warnings: Vec<DataQualityWarning>,
}

/// Validate a normalised candidate string against the report schema.
pub fn validate_response(
    candidate: &str,
    policy: &ValidationPolicy,
) -> Result<ValidatedReport, ResponseError> {
    let value: Value = serde_json::from_str(candidate).map_err(|e| ResponseError::Malformed {
        raw: candidate.to_string(),
        detail: e.to_string(),
    })?;

    let obj = value.as_object().ok_or_else(|| ResponseError::Malformed {
        raw: candidate.to_string(),
        detail: format!("expected a JSON object, found {}", type_name(&value)),
    })?;

    Validator {
        raw: candidate,
        policy,
        warnings: Vec::new(),
    }
    .validate(obj)
}

struct Validator<'a> {
    raw: &'a str,
    policy: &'a ValidationPolicy,
    warnings: Vec<DataQualityWarning>,
}

impl Validator<'_> {
    fn validate(mut self, obj: &Map<String, Value>) -> Result<ValidatedReport, ResponseError> {
        let score = self.score(obj)?;
        let summary = self.required_string(obj, "summary", "summary")?;
        let flags = self.flags(obj)?;

        debug!(
            "Validated report: score {}, {} flags, {} warnings",
            score,
            flags.len(),
            self.warnings.len()
        );

        Ok(ValidatedReport {
            report: LeaseAuditReport {
                score,
                summary,
                flags,
            },
            warnings: self.warnings,
        })
    }

    fn score(&mut self, obj: &Map<String, Value>) -> Result<i64, ResponseError> {
        let value = obj.get("score").ok_or_else(|| self.violation("score", "is missing"))?;
        let score = integer_like(value).ok_or_else(|| {
            self.violation(
                "score",
                format!("must be an integer, found {}", describe(value)),
            )
        })?;

        if (SCORE_MIN..=SCORE_MAX).contains(&score) {
            return Ok(score);
        }
        if !self.policy.clamp_score {
            return Err(self.violation(
                "score",
                format!("must be between {SCORE_MIN} and {SCORE_MAX}, found {score}"),
            ));
        }

        let clamped = score.clamp(SCORE_MIN, SCORE_MAX);
        warn!("Model score {} out of range; clamped to {}", score, clamped);
        self.warnings.push(DataQualityWarning::ScoreClamped {
            original: score,
            clamped,
        });
        Ok(clamped)
    }

    fn flags(&mut self, obj: &Map<String, Value>) -> Result<Vec<Flag>, ResponseError> {
        let value = obj.get("flags").ok_or_else(|| self.violation("flags", "is missing"))?;
        let entries = value.as_array().ok_or_else(|| {
            self.violation(
                "flags",
                format!("must be an array, found {}", describe(value)),
            )
        })?;

        let mut flags = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            flags.push(self.flag(index, entry)?);
        }
        Ok(flags)
    }

    fn flag(&mut self, index: usize, entry: &Value) -> Result<Flag, ResponseError> {
        let path = format!("flags[{index}]");
        let obj = entry.as_object().ok_or_else(|| {
            self.violation(
                &path,
                format!("must be an object, found {}", describe(entry)),
            )
        })?;

        let issue = self.required_string(obj, "issue", &format!("{path}.issue"))?;
        let risk = self.required_string(obj, "risk", &format!("{path}.risk"))?;
        let level_raw = self.required_string(obj, "level", &format!("{path}.level"))?;

        let level = Severity::parse(&level_raw);
        if !level.is_recognized() {
            if self.policy.strict_levels {
                return Err(self.violation(
                    &format!("{path}.level"),
                    format!("must be HIGH, MED or LOW, found {level_raw:?}"),
                ));
            }
            warn!("Flag {} has unrecognized level {:?}", index + 1, level_raw);
            self.warnings.push(DataQualityWarning::UnrecognizedLevel {
                index,
                value: level_raw,
            });
        }

        Ok(Flag { issue, risk, level })
    }

    fn required_string(
        &self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<String, ResponseError> {
        match obj.get(key) {
            None => Err(self.violation(path, "is missing")),
            Some(Value::String(s)) if s.trim().is_empty() => {
                Err(self.violation(path, "must not be empty"))
            }
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.violation(
                path,
                format!("must be a string, found {}", describe(other)),
            )),
        }
    }

    fn violation(&self, field: &str, reason: impl Into<String>) -> ResponseError {
        ResponseError::SchemaViolation {
            field: field.to_string(),
            reason: reason.into(),
            raw: self.raw.to_string(),
        }
    }
}

/// Accept integers, integral floats (`85.0`), and integer strings (`"85"`).
///
/// Integral values beyond `i64` saturate so the range check can clamp them.
fn integer_like(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Number(n) => format!("{n}"),
        Value::String(s) => format!("{s:?}"),
        other => type_name(other).to_string(),
    }
}

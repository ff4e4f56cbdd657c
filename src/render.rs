//! Report rendering: derived display values and text/Markdown output.
//!
//! Everything here is a pure function of a validated [`LeaseAuditReport`].
//! [`ReportView`] computes the derived values once (status, flag count,
//! marker per flag); the renderers only lay them out.

use crate::error::LeaseScanError;
use crate::output::{AuditOutput, Flag, LeaseAuditReport, Severity, REVIEW_THRESHOLD};
use serde::Serialize;
use std::fmt::{self, Write as _};

/// Marker shown next to HIGH flags.
pub const HIGH_MARKER: &str = "🔴";
/// Marker shown next to every other flag, including unrecognized levels.
pub const OTHER_MARKER: &str = "🟡";

/// Overall verdict derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditStatus {
    Safe,
    ReviewRequired,
}

impl AuditStatus {
    pub fn label(self) -> &'static str {
        match self {
            AuditStatus::Safe => "Safe",
            AuditStatus::ReviewRequired => "Review Required",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// "Review Required" below [`REVIEW_THRESHOLD`], "Safe" from it upwards.
pub fn status_for(score: i64) -> AuditStatus {
    if score < REVIEW_THRESHOLD {
        AuditStatus::ReviewRequired
    } else {
        AuditStatus::Safe
    }
}

/// Marker for a flag level.
pub fn marker_for(level: &Severity) -> &'static str {
    if level.is_high() {
        HIGH_MARKER
    } else {
        OTHER_MARKER
    }
}

/// One flag as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagEntry {
    pub marker: &'static str,
    /// Issue title, upper-cased.
    pub title: String,
    pub level: String,
    pub risk: String,
}

impl From<&Flag> for FlagEntry {
    fn from(flag: &Flag) -> Self {
        Self {
            marker: marker_for(&flag.level),
            title: flag.issue.to_uppercase(),
            level: flag.level.as_str().to_string(),
            risk: flag.risk.clone(),
        }
    }
}

/// Display values for a report. Flags keep the model's order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportView {
    pub score: i64,
    pub flag_count: usize,
    pub status: AuditStatus,
    pub summary: String,
    pub entries: Vec<FlagEntry>,
}

impl From<&LeaseAuditReport> for ReportView {
    fn from(report: &LeaseAuditReport) -> Self {
        Self {
            score: report.score,
            flag_count: report.flags.len(),
            status: status_for(report.score),
            summary: report.summary.clone(),
            entries: report.flags.iter().map(FlagEntry::from).collect(),
        }
    }
}

// ── Text ─────────────────────────────────────────────────────────────────

/// Terminal rendering. `color` enables ANSI styling.
pub fn render_text(report: &LeaseAuditReport, color: bool) -> String {
    let view = ReportView::from(report);
    let paint = |code: &str, s: &str| {
        if color {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    };

    let status_code = match view.status {
        AuditStatus::Safe => "1;32",
        AuditStatus::ReviewRequired => "1;33",
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "  Safety Score     {}",
        paint("1", &format!("{}/100", view.score))
    );
    let _ = writeln!(out, "  Red Flags Found  {}", view.flag_count);
    let _ = writeln!(
        out,
        "  Status           {}",
        paint(status_code, view.status.label())
    );
    let _ = writeln!(out, "  {}", "─".repeat(60));
    let _ = writeln!(out, "  {}", view.summary);

    if !view.entries.is_empty() {
        out.push('\n');
        for entry in &view.entries {
            let _ = writeln!(
                out,
                "  {} {} ({})",
                entry.marker,
                paint("1", &entry.title),
                entry.level
            );
            for line in entry.risk.lines() {
                let _ = writeln!(out, "       {}", line);
            }
        }
    }
    out
}

// ── Markdown ─────────────────────────────────────────────────────────────

/// Markdown rendering with one collapsible `<details>` block per flag.
pub fn render_markdown(report: &LeaseAuditReport, title: &str) -> String {
    let view = ReportView::from(report);
    let mut out = String::new();

    let _ = writeln!(out, "# Lease audit: {}\n", title);
    let _ = writeln!(out, "| Safety Score | Red Flags Found | Status |");
    let _ = writeln!(out, "|---|---|---|");
    let _ = writeln!(
        out,
        "| {}/100 | {} | {} |\n",
        view.score, view.flag_count, view.status
    );
    let _ = writeln!(out, "{}\n", view.summary);

    if view.entries.is_empty() {
        return out;
    }

    let _ = writeln!(out, "## Flags\n");
    for entry in &view.entries {
        let _ = writeln!(out, "<details>");
        let _ = writeln!(
            out,
            "<summary>{} {} ({})</summary>\n",
            entry.marker, entry.title, entry.level
        );
        let _ = writeln!(out, "{}\n", entry.risk);
        let _ = writeln!(out, "</details>\n");
    }
    out
}

// ── Formats ──────────────────────────────────────────────────────────────

/// Output format for a finished audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Markdown,
    /// The whole [`AuditOutput`], pretty-printed.
    Json,
}

/// Render an audit in `format`. `color` only affects [`ReportFormat::Text`].
pub fn render_output(
    output: &AuditOutput,
    format: ReportFormat,
    color: bool,
) -> Result<String, LeaseScanError> {
    match format {
        ReportFormat::Text => Ok(render_text(&output.report, color)),
        ReportFormat::Markdown => Ok(render_markdown(&output.report, &output.document.source)),
        ReportFormat::Json => serde_json::to_string_pretty(output)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| LeaseScanError::Internal(format!("JSON serialisation failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(score: i64, levels: &[&str]) -> LeaseAuditReport {
        LeaseAuditReport {
            score,
            summary: "Mostly standard.".to_string(),
            flags: levels
                .iter()
                .enumerate()
                .map(|(i, l)| Flag {
                    issue: format!("Clause {i}"),
                    risk: format!("Risk {i}"),
                    level: Severity::parse(l),
                })
                .collect(),
        }
    }

    #[test]
    fn status_threshold() {
        assert_eq!(status_for(65), AuditStatus::ReviewRequired);
        assert_eq!(status_for(69), AuditStatus::ReviewRequired);
        assert_eq!(status_for(70), AuditStatus::Safe);
        assert_eq!(status_for(85), AuditStatus::Safe);
        assert_eq!(status_for(0).label(), "Review Required");
    }

    #[test]
    fn view_counts_and_status() {
        let view = ReportView::from(&report(65, &["HIGH", "LOW"]));
        assert_eq!(view.flag_count, 2);
        assert_eq!(view.status, AuditStatus::ReviewRequired);

        let view = ReportView::from(&report(85, &[]));
        assert_eq!(view.flag_count, 0);
        assert_eq!(view.status.label(), "Safe");
    }

    #[test]
    fn markers_by_level() {
        let view = ReportView::from(&report(50, &["HIGH", "MED", "LOW", "CRITICAL"]));
        let markers: Vec<_> = view.entries.iter().map(|e| e.marker).collect();
        assert_eq!(markers, [HIGH_MARKER, OTHER_MARKER, OTHER_MARKER, OTHER_MARKER]);
        assert_eq!(view.entries[3].level, "CRITICAL");
    }

    #[test]
    fn lowercase_high_is_not_marked_high() {
        let view = ReportView::from(&report(50, &["high", "MEDIUM"]));
        let markers: Vec<_> = view.entries.iter().map(|e| e.marker).collect();
        assert_eq!(markers, [OTHER_MARKER, OTHER_MARKER]);
        assert_eq!(view.entries[0].level, "high");
        assert_eq!(view.entries[1].level, "MEDIUM");
    }

    #[test]
    fn entries_keep_model_order() {
        let view = ReportView::from(&report(50, &["LOW", "HIGH"]));
        assert_eq!(view.entries[0].title, "CLAUSE 0");
        assert_eq!(view.entries[1].title, "CLAUSE 1");
    }

    #[test]
    fn text_layout() {
        let text = render_text(&report(65, &["HIGH"]), false);
        assert!(text.contains("Safety Score     65/100"));
        assert!(text.contains("Red Flags Found  1"));
        assert!(text.contains("Review Required"));
        assert!(text.contains("🔴 CLAUSE 0 (HIGH)"));
        assert!(text.contains("       Risk 0"));
        assert!(!text.contains("\x1b["));
    }

    #[test]
    fn text_color_is_optional() {
        assert!(render_text(&report(90, &[]), true).contains("\x1b[1;32mSafe\x1b[0m"));
    }

    #[test]
    fn json_output_carries_report_and_warnings() {
        let output = AuditOutput {
            report: report(120, &["HIGH"]),
            warnings: vec![crate::output::DataQualityWarning::ScoreClamped {
                original: 120,
                clamped: 100,
            }],
            document: Default::default(),
            stats: Default::default(),
        };
        let json = render_output(&output, ReportFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["report"]["flags"][0]["level"], "HIGH");
        assert_eq!(value["warnings"][0]["kind"], "score_clamped");
    }

    #[test]
    fn markdown_layout() {
        let md = render_markdown(&report(85, &["MED"]), "lease.pdf");
        assert!(md.starts_with("# Lease audit: lease.pdf"));
        assert!(md.contains("| 85/100 | 1 | Safe |"));
        assert!(md.contains("<summary>🟡 CLAUSE 0 (MED)</summary>"));
        assert!(md.contains("</details>"));

        let empty = render_markdown(&report(85, &[]), "lease.pdf");
        assert!(!empty.contains("<details>"));
    }
}

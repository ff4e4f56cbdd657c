//! Response normalisation: isolate the JSON candidate in a model completion.
//!
//! Models are told to return only a JSON object, yet routinely wrap it in a
//! ```` ```json ```` fence or put a sentence of prose before the fence. This
//! stage strips that wrapping. It is a syntactic pass only: it never parses
//! JSON and never fails. Text without fence markers passes through with only
//! surrounding whitespace trimmed.
//!
//! Rules (applied in order):
//! 1. Drop a leading byte-order mark and trim whitespace
//! 2. If a complete fenced block exists anywhere, keep only its body
//! 3. Otherwise strip an unbalanced leading opener or trailing closer
//! 4. Trim whitespace again

use once_cell::sync::Lazy;
use regex::Regex;

// ── Fence patterns ────────────────────────────────────────────────────────────

/// A complete fenced block with an optional language tag. Lazy body match so
/// the first closing fence ends the block.
static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*(?i:json[c5]?|javascript|js)?[ \t]*\r?\n?(.*?)```").unwrap());

static RE_LEADING_OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[ \t]*(?i:json[c5]?|javascript|js)?[ \t]*").unwrap());

static RE_TRAILING_CLOSER: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*$").unwrap());

/// Reduce a raw completion to the candidate JSON payload.
pub fn normalize_response(raw: &str) -> String {
    let s = raw.trim_start_matches('\u{FEFF}').trim();

    if let Some(body) = fenced_body(s) {
        return body.trim().to_string();
    }

    let s = RE_LEADING_OPENER.replace(s, "");
    let s = RE_TRAILING_CLOSER.replace(&s, "");
    s.trim().to_string()
}

/// Body of the first complete fenced block, if any.
fn fenced_body(s: &str) -> Option<&str> {
    RE_FENCED_BLOCK
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"score": 85, "summary": "Fair.", "flags": []}"#;

    #[test]
    fn strips_json_fence() {
        let raw = format!("```json\n{PAYLOAD}\n```");
        assert_eq!(normalize_response(&raw), PAYLOAD);
    }

    #[test]
    fn strips_bare_fence() {
        let raw = format!("```\n{PAYLOAD}\n```");
        assert_eq!(normalize_response(&raw), PAYLOAD);
    }

    #[test]
    fn fence_tag_is_case_insensitive() {
        let raw = format!("```JSON\n{PAYLOAD}\n```\n");
        assert_eq!(normalize_response(&raw), PAYLOAD);
    }

    #[test]
    fn no_markers_passes_through_trimmed() {
        assert_eq!(normalize_response(PAYLOAD), PAYLOAD);
        assert_eq!(normalize_response(&format!("\n  {PAYLOAD}\t\n")), PAYLOAD);
        assert_eq!(
            normalize_response("I cannot analyze this document."),
            "I cannot analyze this document."
        );
    }

    #[test]
    fn idempotent() {
        let raw = format!("```json\n{PAYLOAD}\n```");
        let once = normalize_response(&raw);
        assert_eq!(normalize_response(&once), once);
    }

    #[test]
    fn prose_around_fenced_block() {
        let raw = format!("Here is the analysis:\n\n```json\n{PAYLOAD}\n```\n\nLet me know!");
        assert_eq!(normalize_response(&raw), PAYLOAD);
    }

    #[test]
    fn single_line_fence() {
        let raw = format!("```json {PAYLOAD}```");
        assert_eq!(normalize_response(&raw), PAYLOAD);
    }

    #[test]
    fn unbalanced_opener() {
        let raw = format!("```json\n{PAYLOAD}");
        assert_eq!(normalize_response(&raw), PAYLOAD);
    }

    #[test]
    fn unbalanced_closer() {
        let raw = format!("{PAYLOAD}\n```");
        assert_eq!(normalize_response(&raw), PAYLOAD);
    }

    #[test]
    fn strips_bom() {
        let raw = format!("\u{FEFF}{PAYLOAD}");
        assert_eq!(normalize_response(&raw), PAYLOAD);
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize_response(""), "");
        assert_eq!(normalize_response("```json\n```"), "");
    }
}

//! Post-processing: turn raw model text into a JSON value.
//!
//! Models told "do not write markdown blocks" still sometimes answer with
//! ```` ```json … ``` ````. Backends that cannot force a JSON response mode go
//! through [`clean_fenced_json`] before [`parse_json`]; backends with native
//! JSON mode go straight to [`parse_json`].
//!
//! ## Rule Order
//!
//! 1. Normalise line endings (CRLF → LF) so the fence regex sees `\n`.
//! 2. Strip invisible Unicode (a leading BOM breaks `serde_json`).
//! 3. Strip an outer fence; if there is none, drop stray fence markers.

use crate::error::PlanError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Characters of offending text kept in [`PlanError::InvalidJson`].
const ERROR_PREVIEW_CHARS: usize = 120;

/// Apply all cleanup rules to a response that may be fenced.
pub fn clean_fenced_json(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    strip_code_fences(&s)
}

/// Parse cleaned text as JSON.
///
/// No schema check happens here: any valid JSON value is accepted.
pub fn parse_json(text: &str) -> Result<Value, PlanError> {
    serde_json::from_str(text).map_err(|source| PlanError::InvalidJson {
        preview: text.trim().chars().take(ERROR_PREVIEW_CHARS).collect(),
        source,
    })
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'], "")
}

// ── Rule 3: Strip code fences ───────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```\s*$").unwrap());

static RE_STRAY_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json|JSON)?").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        return caps[1].trim().to_string();
    }
    // Single-line or unbalanced fences: drop the markers only. Prose around
    // them stays and fails to parse.
    RE_STRAY_FENCE.replace_all(trimmed, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_no_lang() {
        let input = "```\n[1, 2]\n```\n";
        assert_eq!(strip_code_fences(input), "[1, 2]");
    }

    #[test]
    fn test_unfenced_passthrough() {
        let input = "  {\"a\": 1}  ";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_single_line_fence() {
        assert_eq!(strip_code_fences("```json {\"a\": 1} ```"), "{\"a\": 1}");
    }

    #[test]
    fn test_leading_chatter_is_kept_and_rejected() {
        // Only fence markers are removed; prose before them stays.
        let input = "Here is the data:\n```json\n{\"a\": 1}\n```";
        let cleaned = clean_fenced_json(input);
        assert_eq!(cleaned, "Here is the data:\n\n{\"a\": 1}");
        assert!(matches!(
            parse_json(&cleaned),
            Err(PlanError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_crlf_fence() {
        let input = "```json\r\n{\"a\": 1}\r\n```";
        assert_eq!(clean_fenced_json(input), "{\"a\": 1}");
    }

    #[test]
    fn test_bom_removed() {
        let input = "\u{FEFF}{\"a\": 1}";
        assert_eq!(clean_fenced_json(input), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_json_ok() {
        let v = parse_json("{\"summary\": \"x\"}").unwrap();
        assert_eq!(v["summary"], "x");
    }

    #[test]
    fn test_parse_json_error_carries_preview() {
        let err = parse_json("Sorry, I cannot help with that.").unwrap_err();
        match err {
            PlanError::InvalidJson { preview, .. } => {
                assert_eq!(preview, "Sorry, I cannot help with that.")
            }
            other => panic!("expected InvalidJson, got {other:?}"),
        }
    }

    #[test]
    fn test_fenced_text_is_not_json_without_cleanup() {
        assert!(parse_json("```json\n{}\n```").is_err());
        assert!(parse_json(&clean_fenced_json("```json\n{}\n```")).is_ok());
    }
}

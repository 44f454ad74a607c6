//! Cleanup of raw model output before it is decoded.
//!
//! Even with `responseMimeType: application/json` some models wrap the object
//! in a ```` ```json ```` fence or prefix it with a byte-order mark, and
//! providers without schema support do it routinely. These rules are cheap,
//! deterministic and never touch the content inside the object.
//!
//! Rules run in this order: invisible characters first so the fence regex
//! sees clean input, then line endings, then the fence, then outer whitespace.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to a response body.
pub fn clean_json_body(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    let s = strip_code_fence(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip invisible Unicode ──────────────────────────────────────────

/// BOM, zero-width space/joiners, word joiner.
fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}'))
        .collect()
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip an outer code fence ────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\n(.*?)\n?```\s*$").expect("valid fence regex")
});

fn strip_code_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_is_untouched() {
        assert_eq!(clean_json_body("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(clean_json_body("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_bare_fence_with_crlf() {
        assert_eq!(clean_json_body("```\r\n{\"a\":1}\r\n```\r\n"), "{\"a\":1}");
    }

    #[test]
    fn strips_bom_and_whitespace() {
        assert_eq!(clean_json_body("\u{FEFF}  {\"a\":1}\n\n"), "{\"a\":1}");
    }

    #[test]
    fn zero_width_chars_inside_fence_do_not_block_stripping() {
        let body = "\u{200B}```json\n{\"a\":\"b\"}\n```";
        assert_eq!(clean_json_body(body), "{\"a\":\"b\"}");
    }

    #[test]
    fn inner_backticks_are_preserved() {
        let body = "```json\n{\"a\":\"use `cargo`\"}\n```";
        assert_eq!(clean_json_body(body), "{\"a\":\"use `cargo`\"}");
    }

    #[test]
    fn empty_body_stays_empty() {
        assert_eq!(clean_json_body("  \n"), "");
    }
}

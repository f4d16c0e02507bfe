//! Text helpers for tool output.

use regex::Regex;
use std::sync::OnceLock;

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript|svg|head)\b[^>]*>.*?</(script|style|noscript|svg|head)>")
            .expect("Invalid regex for block")
    })
}

fn break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<(br|/p|/div|/li|/tr|/h[1-6]|/table|/section|/article)\b[^>]*>")
            .expect("Invalid regex for break")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid regex for tag"))
}

fn blank_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n+").expect("Invalid regex for blank"))
}

/// Strips markup from an HTML document, keeping block boundaries as newlines.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = block_re().replace_all(html, " ");
    let with_breaks = break_re().replace_all(&without_blocks, "\n");
    let stripped = tag_re().replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);

    let lines: Vec<String> = decoded
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    blank_re()
        .replace_all(lines.join("\n").trim(), "\n\n")
        .to_string()
}

/// Decodes the handful of entities common in scraped pages and sheet XML.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Truncates to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}\n...[truncated]", &s[..byte_idx]),
        None => s.to_string(),
    }
}

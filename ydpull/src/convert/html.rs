//! Fallback converter for notes that predate the XML schema. Their bodies
//! are HTML-flavored and rarely well-formed, so this route works on text
//! with regexes instead of an XML reader.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::{ConvertError, replace_with_markdown};

static XML_DECL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\?xml[^>]*\?>|<!DOCTYPE[^>]*>").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]>").unwrap());
static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\b[^>]*src\s*=\s*["']([^"']*)["'][^>]*>"#).unwrap());
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#).unwrap()
});
static LI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").unwrap());
static LIST_WRAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(ul|ol)\b[^>]*>|</li>").unwrap());
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(b|strong)\b[^>]*>").unwrap());
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(i|em)\b[^>]*>").unwrap());
static HR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<hr\b[^>]*>").unwrap());
static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\b[^>]*>|</?(div|p)\b[^>]*>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static MULTI_NEWLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

pub(crate) fn html_to_markdown(body: &str) -> String {
    let mut text = XML_DECL_RE.replace_all(body, "").into_owned();
    text = HEADING_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("\n{} {}\n", "#".repeat(level), caps[2].trim())
        })
        .into_owned();
    text = IMG_RE.replace_all(&text, "\n![]($1)\n").into_owned();
    text = ANCHOR_RE.replace_all(&text, "[$2]($1)").into_owned();
    text = LI_RE.replace_all(&text, "\n- ").into_owned();
    text = LIST_WRAP_RE.replace_all(&text, "").into_owned();
    text = BOLD_RE.replace_all(&text, "**").into_owned();
    text = ITALIC_RE.replace_all(&text, "*").into_owned();
    text = HR_RE.replace_all(&text, "\n---\n").into_owned();
    text = BREAK_RE.replace_all(&text, "\n").into_owned();
    text = TAG_RE.replace_all(&text, "").into_owned();
    text = html_escape::decode_html_entities(&text).into_owned();
    text = MULTI_NEWLINE_RE.replace_all(&text, "\n\n").into_owned();
    let mut out = text.trim().to_string();
    out.push('\n');
    out
}

/// Converts a pulled HTML-flavored note file in place, leaving a `.md`
/// sibling. This route never fails on malformed markup, only on I/O.
pub fn html_note_to_markdown(path: &Path) -> Result<PathBuf, ConvertError> {
    let raw = String::from_utf8(std::fs::read(path)?)?;
    let markdown = html_to_markdown(&raw);
    replace_with_markdown(path, markdown)
}

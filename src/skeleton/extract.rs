//! Document extraction from raw text backend output.
//!
//! Backends wrap the page in prose, code fences or both. Rules are tried in
//! [`ExtractionRule::PRIORITY`] order and the first one that yields non-blank text wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// The rest of the label line is optional so single-line fences match too.
static HTML_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```[ \t]*html\b(?:[^\n`<]*\n)?(.*?)```").unwrap());

static GENERIC_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[^\n`<]*\n)?(.*?)```").unwrap());

static HTML_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<html\b.*</html\s*>").unwrap());

static DOCTYPE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<!doctype\b.*</html\s*>").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRule {
    /// ```` ```html ```` fenced block
    HtmlFence,
    /// Any other fenced block
    GenericFence,
    /// `<html>` … `</html>`
    HtmlElement,
    /// `<!DOCTYPE` … `</html>`
    DoctypeSpan,
    /// Whole response, trimmed
    RawText,
}

impl ExtractionRule {
    pub const PRIORITY: [ExtractionRule; 5] = [
        ExtractionRule::HtmlFence,
        ExtractionRule::GenericFence,
        ExtractionRule::HtmlElement,
        ExtractionRule::DoctypeSpan,
        ExtractionRule::RawText,
    ];

    /// Text this rule extracts from `raw`, if it matches with non-blank content.
    pub fn apply(&self, raw: &str) -> Option<String> {
        let extracted = match self {
            ExtractionRule::HtmlFence => capture_group(&HTML_FENCE, raw),
            ExtractionRule::GenericFence => capture_group(&GENERIC_FENCE, raw),
            ExtractionRule::HtmlElement => HTML_ELEMENT.find(raw).map(|m| m.as_str()),
            ExtractionRule::DoctypeSpan => DOCTYPE_SPAN.find(raw).map(|m| m.as_str()),
            ExtractionRule::RawText => Some(raw),
        }?;
        let trimmed = extracted.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

fn capture_group<'a>(pattern: &Regex, raw: &'a str) -> Option<&'a str> {
    pattern
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|body| !body.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub rule: ExtractionRule,
    pub document: String,
}

/// `None` only when the response is blank.
pub fn extract_document(raw: &str) -> Option<Extraction> {
    ExtractionRule::PRIORITY.iter().find_map(|rule| {
        rule.apply(raw).map(|document| Extraction {
            rule: *rule,
            document,
        })
    })
}

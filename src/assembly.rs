//! Template Assembly
//!
//! Stage three: substitute resolved asset URLs into the skeleton, then repair the
//! document structure. Pure text transforms; every repair rule is idempotent, so
//! `repair(repair(x)) == repair(x)`.

use crate::image::AssetRequest;
use crate::synthesis::AssetBatch;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

pub const DOCTYPE: &str = "<!DOCTYPE html>";

pub const TAILWIND_HOST: &str = "cdn.tailwindcss.com";

const TAILWIND_SCRIPT: &str = "<script src=\"https://cdn.tailwindcss.com\"></script>";

const MINIMAL_HEAD: &str = "<head>\n\
<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<title>Generated Page</title>\n\
</head>\n";

static HTML_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html[\s>]").unwrap());
static HEAD_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<head[\s>]").unwrap());
static HEAD_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static BODY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body[\s>]").unwrap());

/// Substitute every resolved asset into `skeleton` and repair the result.
///
/// Tokens without a result are left as they are.
pub fn assemble(skeleton: &str, requests: &[AssetRequest], batch: &AssetBatch) -> String {
    let mut document = skeleton.to_string();
    for request in requests {
        let Some(result) = batch.get(&request.id) else {
            warn!(asset_id = %request.id, "no result for asset; token left in place");
            continue;
        };
        if !document.contains(&request.placeholder_token) {
            debug!(asset_id = %request.id, token = %request.placeholder_token, "token absent from skeleton");
            continue;
        }
        document = document.replace(&request.placeholder_token, &result.url);
    }
    repair(&document)
}

/// Apply the structural repair rules in order.
pub fn repair(text: &str) -> String {
    let text = ensure_doctype(text);
    let text = ensure_root(&text);
    let text = ensure_head(&text);
    ensure_stylesheet(&text)
}

pub fn ensure_doctype(text: &str) -> String {
    let trimmed = text.trim_start();
    let has_doctype = trimmed
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"));
    if has_doctype {
        text.to_string()
    } else {
        format!("{}\n{}", DOCTYPE, trimmed)
    }
}

pub fn ensure_root(text: &str) -> String {
    if HTML_OPEN.is_match(text) {
        return text.to_string();
    }
    let (prologue, content) = split_doctype(text);
    let content = content.trim();
    let mut out = String::with_capacity(text.len() + 32);
    if !prologue.is_empty() {
        out.push_str(prologue);
        out.push('\n');
    }
    out.push_str("<html lang=\"en\">\n");
    if !content.is_empty() {
        out.push_str(content);
        out.push('\n');
    }
    out.push_str("</html>");
    out
}

pub fn ensure_head(text: &str) -> String {
    if HEAD_OPEN.is_match(text) {
        return text.to_string();
    }
    let at = BODY_OPEN
        .find(text)
        .map(|m| m.start())
        .or_else(|| HTML_OPEN.find(text).map(|m| tag_end(text, m.start())))
        .unwrap_or_else(|| split_doctype(text).0.len());
    insert_at(text, at, MINIMAL_HEAD)
}

pub fn ensure_stylesheet(text: &str) -> String {
    if text.contains(TAILWIND_HOST) {
        return text.to_string();
    }
    let at = HEAD_CLOSE
        .find(text)
        .map(|m| m.start())
        .or_else(|| HEAD_OPEN.find(text).map(|m| tag_end(text, m.start())));
    match at {
        Some(at) => insert_at(text, at, &format!("{}\n", TAILWIND_SCRIPT)),
        None => text.to_string(),
    }
}

/// `(doctype declaration, rest)`; the declaration is empty when absent.
fn split_doctype(text: &str) -> (&str, &str) {
    let trimmed = text.trim_start();
    let has_doctype = trimmed
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"));
    if !has_doctype {
        return ("", text);
    }
    let offset = text.len() - trimmed.len();
    let end = tag_end(text, offset);
    (&text[..end], &text[end..])
}

/// Byte offset just past the `>` closing the tag that starts at `start`.
fn tag_end(text: &str, start: usize) -> usize {
    text[start..]
        .find('>')
        .map(|i| start + i + 1)
        .unwrap_or(text.len())
}

fn insert_at(text: &str, at: usize, fragment: &str) -> String {
    let mut out = String::with_capacity(text.len() + fragment.len() + 1);
    out.push_str(&text[..at]);
    if at > 0 && !text[..at].ends_with('\n') {
        out.push('\n');
    }
    out.push_str(fragment);
    out.push_str(&text[at..]);
    out
}

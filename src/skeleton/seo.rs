//! SEO metadata pulled from the skeleton's head.

use crate::skeleton::tag_attributes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").unwrap());

static META_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
}

impl SeoMetadata {
    pub fn extract(document: &str) -> Self {
        let title = TITLE
            .captures(document)
            .and_then(|caps| clean(&caps[1]));

        let mut description = None;
        let mut keywords = None;
        let mut og_title = None;
        let mut og_description = None;

        for tag in META_TAG.find_iter(document) {
            let attributes = tag_attributes(tag.as_str());
            let Some(content) = attributes.get("content").and_then(|c| clean(c)) else {
                continue;
            };
            let key = attributes
                .get("name")
                .or_else(|| attributes.get("property"))
                .map(|k| k.trim().to_ascii_lowercase());
            let slot = match key.as_deref() {
                Some("description") => &mut description,
                Some("keywords") => &mut keywords,
                Some("og:title") => &mut og_title,
                Some("og:description") => &mut og_description,
                _ => continue,
            };
            slot.get_or_insert(content);
        }

        let keywords = keywords
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            og_title: og_title.or_else(|| title.clone()),
            og_description: og_description.or_else(|| description.clone()),
            title,
            description,
            keywords,
        }
    }
}

/// Collapses whitespace; blank becomes `None`.
fn clean(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

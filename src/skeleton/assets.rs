//! Asset request discovery.
//!
//! Every distinct `{{IMAGE_PLACEHOLDER_<n>}}` token in the skeleton becomes one
//! [`AssetRequest`] with id `image-<n>`, in order of first appearance. An `<img>` tag
//! whose `src` carries the token supplies the description (`alt`), style (`data-style`)
//! and aspect class (`data-aspect`).

use crate::image::{AspectRatio, AssetRequest};
use crate::skeleton::tag_attributes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{IMAGE_PLACEHOLDER_(\d+)\}\}").unwrap());

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").unwrap());

pub fn placeholder_token(n: usize) -> String {
    format!("{{{{IMAGE_PLACEHOLDER_{}}}}}", n)
}

pub fn discover_assets(document: &str, fallback_description: &str) -> Vec<AssetRequest> {
    let tagged = tagged_images(document);
    let mut seen = HashSet::new();
    let mut requests = Vec::new();

    for caps in TOKEN.captures_iter(document) {
        let token = caps[0].to_string();
        if !seen.insert(token.clone()) {
            continue;
        }
        let attributes = tagged.get(&token);
        let attribute = |name: &str| {
            attributes
                .and_then(|attrs| attrs.get(name))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let request = AssetRequest {
            id: format!("image-{}", &caps[1]),
            description: attribute("alt")
                .unwrap_or_else(|| fallback_description.trim())
                .to_string(),
            style_hint: attribute("data-style").map(str::to_string),
            aspect_ratio: attribute("data-aspect")
                .map(AspectRatio::from_hint)
                .unwrap_or_default(),
            placeholder_token: token,
        };
        requests.push(request);
    }

    debug!(count = requests.len(), "asset placeholders discovered");
    requests
}

/// Token → attributes of the first `<img>` whose `src` contains it.
fn tagged_images(document: &str) -> HashMap<String, HashMap<String, String>> {
    let mut tagged = HashMap::new();
    for tag in IMG_TAG.find_iter(document) {
        let attributes = tag_attributes(tag.as_str());
        let token = attributes
            .get("src")
            .and_then(|src| TOKEN.find(src))
            .map(|m| m.as_str().to_string());
        if let Some(token) = token {
            tagged.entry(token).or_insert(attributes);
        }
    }
    tagged
}

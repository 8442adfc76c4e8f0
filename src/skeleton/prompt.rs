//! Prompt construction for the skeleton backend.

use crate::image::AspectRatio;
use crate::provider::ChatMessage;
use crate::request::{GenerationRequest, PageConfig};
use crate::skeleton::placeholder_token;
use std::fmt::Write;

const SYSTEM_PROMPT: &str = "You are a senior front-end developer. You write complete, \
responsive, single-file HTML5 pages styled with Tailwind CSS utility classes. \
Reply with the full document inside one ```html fenced block and nothing else.";

pub fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(&request.prompt, &request.page)),
    ]
}

fn user_prompt(prompt: &str, page: &PageConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Build a {} page for the following request:", page.page_type);
    let _ = writeln!(out, "{}", prompt.trim());
    out.push('\n');

    if let Some(title) = page.title.as_deref().filter(|t| !t.trim().is_empty()) {
        let _ = writeln!(out, "Page title: {}", title.trim());
    }
    if !page.sections.is_empty() {
        let _ = writeln!(out, "Sections, in order: {}", page.sections.join(", "));
    }
    if let Some(scheme) = page.color_scheme.as_deref().filter(|s| !s.trim().is_empty()) {
        let _ = writeln!(out, "Color scheme: {}", scheme.trim());
    }
    let _ = writeln!(out, "Document language: {}", page.language);
    for hint in page.hints.iter().filter(|h| !h.trim().is_empty()) {
        let _ = writeln!(out, "Hint: {}", hint.trim());
    }

    out.push('\n');
    out.push_str("Requirements:\n");
    out.push_str("- Include <title>, <meta name=\"description\">, <meta name=\"keywords\"> and Open Graph title/description tags in <head>.\n");
    let _ = writeln!(
        out,
        "- Use at most {} images. Every image src must be a placeholder token such as {} \
         (numbered from 1, each number used once).",
        page.max_images,
        placeholder_token(1)
    );
    out.push_str("- Give every image a descriptive alt text; it is used to generate the picture.\n");
    let _ = writeln!(
        out,
        "- Optionally add data-style=\"<art style>\" and data-aspect=\"<{}>\" to each <img>.",
        AspectRatio::ALL
            .iter()
            .map(AspectRatio::as_str)
            .collect::<Vec<_>>()
            .join("|")
    );
    out.push_str("- Do not reference external images or fonts other than the Tailwind CDN.\n");
    out
}

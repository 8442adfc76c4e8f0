//! Post-processing of raw text backend output into a skeleton draft.

use crate::integration::test_utils::THREE_IMAGE_SKELETON;
use pagewright::image::AspectRatio;
use pagewright::skeleton::{extract_document, ExtractionRule, SkeletonDraft, SkeletonResponse};

fn response(text: &str) -> SkeletonResponse {
    SkeletonResponse {
        text: text.to_string(),
        backend_id: "ollama".to_string(),
        model: "llama3".to_string(),
        prompt: "prompt".to_string(),
        usage: None,
    }
}

#[test]
fn test_extraction_rule_priority() {
    let cases = [
        ("```html\n<p>a</p>\n```", ExtractionRule::HtmlFence),
        ("Sure!\n```\n<p>b</p>\n```", ExtractionRule::GenericFence),
        ("```html <p>e</p>```", ExtractionRule::HtmlFence),
        ("Intro <html><body>c</body></html> outro", ExtractionRule::HtmlElement),
        ("<main>d</main>", ExtractionRule::RawText),
    ];
    for (raw, rule) in cases {
        assert_eq!(extract_document(raw).unwrap().rule, rule, "input: {raw}");
    }
    assert!(extract_document("  \n\t").is_none());
}

#[test]
fn test_empty_fence_falls_through_to_later_rules() {
    let raw = "```html\n\n```\n<html><body>real</body></html>";
    let extraction = extract_document(raw).unwrap();
    assert_eq!(extraction.rule, ExtractionRule::HtmlElement);
    assert_eq!(extraction.document, "<html><body>real</body></html>");
}

#[test]
fn test_draft_collects_assets_and_seo() {
    let draft = SkeletonDraft::from_response(response(THREE_IMAGE_SKELETON), "bakery").unwrap();

    assert_eq!(draft.rule, ExtractionRule::HtmlFence);
    assert!(draft.document.starts_with("<!DOCTYPE html>"));
    assert!(draft.document.ends_with("</html>"));

    let ids: Vec<&str> = draft.assets.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["image-1", "image-2", "image-3"]);
    assert_eq!(draft.assets[0].description, "fresh loaves");
    assert_eq!(draft.assets[0].aspect_ratio, AspectRatio::Landscape);
    assert_eq!(draft.assets[2].aspect_ratio, AspectRatio::Portrait);

    assert_eq!(draft.seo.title.as_deref(), Some("Juniper Bakery"));
    assert_eq!(draft.seo.og_title.as_deref(), Some("Juniper Bakery"));
}

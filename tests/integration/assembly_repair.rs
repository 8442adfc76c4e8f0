//! Asset substitution and structural repair of assembled documents.

use pagewright::assembly::{assemble, repair};
use pagewright::image::{AspectRatio, AssetRequest, AssetResult, ImageProvider};
use pagewright::skeleton::placeholder_token;
use pagewright::synthesis::AssetBatch;

fn request(n: usize) -> AssetRequest {
    AssetRequest {
        id: format!("image-{}", n),
        placeholder_token: placeholder_token(n),
        description: format!("picture {}", n),
        style_hint: None,
        aspect_ratio: AspectRatio::Square,
    }
}

fn resolved(n: usize) -> AssetResult {
    AssetResult {
        id: format!("image-{}", n),
        url: format!("https://cdn.test/{}.png", n),
        succeeded: true,
        provider_used: Some(ImageProvider::Pollinations),
        attempts: 1,
        error: None,
    }
}

#[test]
fn test_every_occurrence_of_a_token_is_replaced() {
    let skeleton = format!(
        "<body><img src=\"{t}\"><a href=\"{t}\">full size</a></body>",
        t = placeholder_token(1)
    );
    let batch: AssetBatch = vec![resolved(1)].into_iter().collect();
    let page = assemble(&skeleton, &[request(1)], &batch);

    assert_eq!(page.matches("https://cdn.test/1.png").count(), 2);
    assert!(!page.contains("IMAGE_PLACEHOLDER_1"));
}

#[test]
fn test_unresolved_token_stays_and_unknown_results_are_ignored() {
    let skeleton = format!(
        "<!DOCTYPE html><html><head><script src=\"https://cdn.tailwindcss.com\"></script></head><body><img src=\"{}\"><img src=\"{}\"></body></html>",
        placeholder_token(1),
        placeholder_token(2)
    );
    // image-3 has a result but no token in the skeleton; image-2 has a token but no result.
    let batch: AssetBatch = vec![resolved(1), resolved(3)].into_iter().collect();
    let page = assemble(&skeleton, &[request(1), request(2), request(3)], &batch);

    assert!(page.contains("https://cdn.test/1.png"));
    assert!(page.contains(&placeholder_token(2)));
    assert!(!page.contains("https://cdn.test/3.png"));
    assert_eq!(page, skeleton.replace(&placeholder_token(1), "https://cdn.test/1.png"));
}

#[test]
fn test_head_without_stylesheet_gets_one_before_closing_tag() {
    let page = repair("<!DOCTYPE html>\n<html>\n<head>\n<title>x</title>\n</head>\n<body></body>\n</html>");
    let script = page.find("cdn.tailwindcss.com").unwrap();
    let title = page.find("<title>x</title>").unwrap();
    let head_close = page.find("</head>").unwrap();
    assert!(title < script && script < head_close);
    assert_eq!(page.matches("<head").count(), 1);
}

#[test]
fn test_body_without_head_gets_minimal_head_before_body() {
    let page = repair("<html lang=\"de\"><body><p>Hallo</p></body></html>");
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("<html lang=\"de\">"));
    let head = page.find("<head>").unwrap();
    let body = page.find("<body>").unwrap();
    assert!(head < body);
    assert!(page.contains("<meta charset=\"UTF-8\">"));
    assert_eq!(repair(&page), page);
}

#[test]
fn test_lowercase_doctype_is_accepted() {
    let input = "<!doctype html>\n<html><head><script src=\"https://cdn.tailwindcss.com\"></script></head><body></body></html>";
    assert_eq!(repair(input), input);
}

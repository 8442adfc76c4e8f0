//! Provider fallback chain and concurrent synthesis through the public API.

use crate::integration::test_utils::{call_log, policy, synthesizer, ScriptedImageBackend};
use pagewright::error::AttemptErrorKind;
use pagewright::image::{AspectRatio, AssetRequest, ChainPolicy, FallbackChain, ImageProvider, ImageSpec};
use pagewright::request::Credentials;
use pagewright::skeleton::placeholder_token;
use pagewright::synthesis::Settlement;
use std::time::Duration;

fn asset(n: usize, description: &str) -> AssetRequest {
    AssetRequest {
        id: format!("image-{}", n),
        placeholder_token: placeholder_token(n),
        description: description.to_string(),
        style_hint: None,
        aspect_ratio: AspectRatio::Landscape,
    }
}

#[tokio::test]
async fn test_preferred_provider_runs_first_then_priority_order() {
    let calls = call_log();
    let chain = FallbackChain::new(policy(vec![
        ImageProvider::OpenAi,
        ImageProvider::Unsplash,
        ImageProvider::Pollinations,
    ]))
    .with_backend(ScriptedImageBackend::new(ImageProvider::OpenAi, &calls).always_failing().shared())
    .with_backend(ScriptedImageBackend::new(ImageProvider::Unsplash, &calls).always_failing().shared())
    .with_backend(ScriptedImageBackend::new(ImageProvider::Pollinations, &calls).shared());

    let outcome = chain
        .resolve(
            &ImageSpec::new("harbour at dusk", AspectRatio::Wide),
            ImageProvider::Unsplash,
            &Credentials::new(),
        )
        .await;

    let order: Vec<ImageProvider> = calls.lock().iter().map(|(p, _)| *p).collect();
    assert_eq!(
        order,
        vec![ImageProvider::Unsplash, ImageProvider::OpenAi, ImageProvider::Pollinations]
    );
    assert!(outcome.succeeded());
    assert_eq!(outcome.provider(), Some(ImageProvider::Pollinations));
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.url(), "https://pollinations.test/harbour-at-dusk");
}

#[tokio::test]
async fn test_standard_chain_without_credentials_falls_back_to_pollinations() {
    let chain = FallbackChain::standard(ChainPolicy::default(), false).unwrap();
    let outcome = chain
        .resolve(
            &ImageSpec::new("mountain cabin", AspectRatio::Landscape),
            ImageProvider::OpenAi,
            &Credentials::new(),
        )
        .await;

    assert!(outcome.succeeded());
    assert_eq!(outcome.provider(), Some(ImageProvider::Pollinations));
    let kinds: Vec<AttemptErrorKind> = outcome.failures().iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![AttemptErrorKind::MissingCredential; 3]);
    assert!(outcome.url().starts_with("https://image.pollinations.ai/prompt/mountain%20cabin"));
    assert!(outcome.url().contains("width=1280&height=720"));
}

#[tokio::test]
async fn test_hung_backend_is_cut_off_by_attempt_timeout() {
    let calls = call_log();
    let chain = FallbackChain::new(
        policy(vec![ImageProvider::Stability, ImageProvider::Pollinations])
            .with_attempt_timeout(Duration::from_millis(50)),
    )
    .with_backend(
        ScriptedImageBackend::new(ImageProvider::Stability, &calls)
            .with_delay(Duration::from_secs(10))
            .shared(),
    )
    .with_backend(ScriptedImageBackend::new(ImageProvider::Pollinations, &calls).shared());

    let outcome = chain
        .resolve(
            &ImageSpec::new("lighthouse", AspectRatio::Square),
            ImageProvider::Stability,
            &Credentials::new(),
        )
        .await;

    assert_eq!(outcome.provider(), Some(ImageProvider::Pollinations));
    assert_eq!(outcome.failures().len(), 1);
    assert_eq!(outcome.failures()[0].kind, AttemptErrorKind::Timeout);
}

#[tokio::test]
async fn test_exhausted_chain_placeholder_matches_aspect() {
    let calls = call_log();
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations]))
        .with_backend(ScriptedImageBackend::new(ImageProvider::Pollinations, &calls).always_failing().shared());

    for (aspect, size) in [
        (AspectRatio::Square, "800x800"),
        (AspectRatio::Landscape, "1280x720"),
        (AspectRatio::Portrait, "720x1280"),
        (AspectRatio::Standard, "1024x768"),
        (AspectRatio::Wide, "1680x720"),
    ] {
        let outcome = chain
            .resolve(&ImageSpec::new("team photo", aspect), ImageProvider::Pollinations, &Credentials::new())
            .await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.url(), format!("https://placehold.co/{}?text=team%20photo", size));
    }
}

#[tokio::test]
async fn test_serial_synthesis_settles_in_request_order() {
    let calls = call_log();
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations]))
        .with_backend(ScriptedImageBackend::new(ImageProvider::Pollinations, &calls).failing_on("bad").shared());
    let synthesizer = synthesizer(chain, 1);

    let requests = vec![asset(1, "first"), asset(2, "bad second"), asset(3, "third")];
    let mut settled = Vec::new();
    let batch = synthesizer
        .generate_all(
            &requests,
            ImageProvider::Pollinations,
            &Credentials::new(),
            &mut |s: Settlement<'_>| settled.push((s.completed, s.total, s.result.id.clone())),
        )
        .await;

    assert_eq!(
        settled,
        vec![
            (1, 3, "image-1".to_string()),
            (2, 3, "image-2".to_string()),
            (3, 3, "image-3".to_string()),
        ]
    );
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.succeeded_count(), 2);
    assert!(batch.get("image-2").unwrap().url.starts_with("https://placehold.co/1280x720"));

    let described: Vec<String> = calls.lock().iter().map(|(_, d)| d.clone()).collect();
    assert_eq!(described, vec!["first", "bad second", "third"]);
}

//! Property-based tests for repair, placeholders and synthesis accounting

use pagewright::assembly::{repair, DOCTYPE, TAILWIND_HOST};
use pagewright::image::{AspectRatio, AssetRequest, ChainPolicy, FallbackChain, ImageProvider, PlaceholderTable};
use pagewright::request::Credentials;
use pagewright::skeleton::placeholder_token;
use pagewright::synthesis::{AssetSynthesizer, Settlement};
use proptest::prelude::*;

fn aspect() -> impl Strategy<Value = AspectRatio> {
    proptest::sample::select(AspectRatio::ALL.to_vec())
}

/// Loose HTML-ish fragments: optional doctype, html, head and body pieces around text.
fn fragment() -> impl Strategy<Value = String> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        "[a-zA-Z0-9 <>/=\"]{0,40}",
    )
        .prop_map(|(doctype, html, head, body, text)| {
            let mut inner = String::new();
            if head {
                inner.push_str("<head><title>t</title></head>");
            }
            if body {
                inner.push_str(&format!("<body>{}</body>", text));
            } else {
                inner.push_str(&text);
            }
            let mut out = String::new();
            if doctype {
                out.push_str("<!DOCTYPE html>\n");
            }
            if html {
                out.push_str(&format!("<html lang=\"en\">{}</html>", inner));
            } else {
                out.push_str(&inner);
            }
            out
        })
}

/// Repairing twice changes nothing, and every repaired document has the required structure.
#[test]
fn test_repair_is_idempotent_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&fragment(), |input| {
            let once = repair(&input);
            let twice = repair(&once);
            prop_assert_eq!(&once, &twice);

            prop_assert!(once.starts_with(DOCTYPE) || once.trim_start().to_ascii_lowercase().starts_with("<!doctype"));
            prop_assert!(once.contains("<html"));
            prop_assert!(once.contains("<head"));
            prop_assert!(once.contains(TAILWIND_HOST));
            Ok(())
        })
        .unwrap();
}

/// Same description and aspect always map to the same placeholder URL.
#[test]
fn test_placeholder_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let table = PlaceholderTable::default();

    runner
        .run(&(any::<String>(), aspect()), |(description, aspect)| {
            let first = table.url_for(&description, aspect);
            let second = PlaceholderTable::default().url_for(&description, aspect);
            prop_assert_eq!(&first, &second);

            let dims = table.dimensions(aspect);
            let expected_prefix = format!("https://placehold.co/{}x{}?text=", dims.width, dims.height);
            prop_assert!(first.starts_with(&expected_prefix));
            Ok(())
        })
        .unwrap();
}

/// generate_all settles exactly once per distinct id, whatever the concurrency limit.
#[test]
fn test_synthesis_settles_every_asset_property() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut runner = proptest::test_runner::TestRunner::new(proptest::test_runner::Config {
        cases: 32,
        ..proptest::test_runner::Config::default()
    });

    runner
        .run(&(0usize..12, 0usize..6), |(count, max_concurrency)| {
            let requests: Vec<AssetRequest> = (1..=count)
                .map(|n| AssetRequest {
                    id: format!("image-{}", n),
                    placeholder_token: placeholder_token(n),
                    description: format!("picture {}", n),
                    style_hint: None,
                    aspect_ratio: AspectRatio::Standard,
                })
                .collect();
            // No backends registered: every asset exhausts to its placeholder.
            let synthesizer = AssetSynthesizer::new(FallbackChain::new(ChainPolicy::default()), max_concurrency);

            let mut settled = Vec::new();
            let batch = runtime.block_on(synthesizer.generate_all(
                &requests,
                ImageProvider::Pollinations,
                &Credentials::new(),
                &mut |s: Settlement<'_>| settled.push(s.completed),
            ));

            prop_assert_eq!(batch.len(), count);
            prop_assert_eq!(batch.degraded_count(), count);
            prop_assert_eq!(settled, (1..=count).collect::<Vec<_>>());
            for request in &requests {
                prop_assert!(batch.get(&request.id).is_some());
            }
            Ok(())
        })
        .unwrap();
}

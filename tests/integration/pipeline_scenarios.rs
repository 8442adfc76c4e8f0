//! End-to-end runs of the stage orchestrator.

use crate::integration::test_utils::{
    call_log, policy, request, synthesizer, FixedSkeleton, ScriptedImageBackend, THREE_IMAGE_SKELETON,
};
use async_trait::async_trait;
use pagewright::error::{AttemptError, GenerationError, PersistenceError, ProviderError, StageFault};
use pagewright::image::{FallbackChain, ImageBackend, ImageProvider, ImageSpec};
use pagewright::pipeline::{
    AuditEntry, MemoryRunRecorder, ProgressEvent, RunRecorder, RunStatus, Stage, StageOrchestrator,
};
use pagewright::provider::ModelProvider;
use pagewright::skeleton::{ExtractionRule, ProviderSkeletonGenerator};
use pagewright::GenerationRequest;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type Timeline = Arc<Mutex<Vec<String>>>;

/// Pollinations stand-in that holds "oven" images back and logs each resolution.
struct PacedBackend {
    timeline: Timeline,
}

#[async_trait]
impl ImageBackend for PacedBackend {
    fn provider(&self) -> ImageProvider {
        ImageProvider::Pollinations
    }

    async fn generate(&self, spec: &ImageSpec, _api_key: Option<&str>) -> Result<String, AttemptError> {
        if spec.description.contains("oven") {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        self.timeline.lock().push(format!("resolved {}", spec.description));
        Ok(format!("https://paced.test/{}", spec.description.replace(' ', "-")))
    }
}

/// Memory recorder that also logs asset audit writes onto the shared timeline.
struct TimelineRecorder {
    inner: MemoryRunRecorder,
    timeline: Timeline,
}

#[async_trait]
impl RunRecorder for TimelineRecorder {
    async fn create_run(&self, request: &GenerationRequest) -> Result<String, PersistenceError> {
        self.inner.create_run(request).await
    }

    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        artifact: Option<&str>,
        progress: u8,
    ) -> Result<(), PersistenceError> {
        self.inner.update_run(run_id, status, artifact, progress).await
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), PersistenceError> {
        if entry.stage == Stage::Assets {
            self.timeline.lock().push(format!("audit {}", entry.prompt));
        }
        self.inner.append_audit(entry).await
    }
}

fn bakery_orchestrator(calls: &crate::integration::test_utils::CallLog) -> StageOrchestrator {
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations, ImageProvider::Unsplash]))
        .with_backend(ScriptedImageBackend::new(ImageProvider::Pollinations, calls).failing_on("oven").shared())
        .with_backend(ScriptedImageBackend::new(ImageProvider::Unsplash, calls).failing_on("oven").shared());
    StageOrchestrator::new(Arc::new(FixedSkeleton::new(THREE_IMAGE_SKELETON)), synthesizer(chain, 2))
}

#[tokio::test]
async fn test_full_run_degrades_only_the_failing_asset() {
    let calls = call_log();
    let recorder = Arc::new(MemoryRunRecorder::new());
    let orchestrator = bakery_orchestrator(&calls).with_recorder(recorder.clone() as Arc<dyn RunRecorder>);

    let mut events: Vec<ProgressEvent> = Vec::new();
    let outcome = orchestrator
        .generate(&request("A neighbourhood bakery"), &mut |event: &ProgressEvent| {
            events.push(event.clone())
        })
        .await
        .unwrap();

    // Two resolved by the preferred backend, one exhausted to a placeholder.
    let summary = outcome.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.degraded, 1);

    let loaves = outcome.assets.get("image-1").unwrap();
    assert!(loaves.succeeded);
    assert_eq!(loaves.provider_used, Some(ImageProvider::Pollinations));
    assert_eq!(loaves.attempts, 1);

    let oven = outcome.assets.get("image-3").unwrap();
    assert!(!oven.succeeded);
    assert_eq!(oven.provider_used, None);
    assert_eq!(oven.attempts, 2);
    assert_eq!(oven.url, "https://placehold.co/720x1280?text=broken%20oven");

    assert!(outcome.artifact.contains("https://pollinations.test/fresh-loaves"));
    assert!(outcome.artifact.contains("https://pollinations.test/croissant-close-up"));
    assert!(outcome.artifact.contains("https://placehold.co/720x1280?text=broken%20oven"));
    assert!(!outcome.artifact.contains("IMAGE_PLACEHOLDER"));
    assert!(outcome.artifact.starts_with("<!DOCTYPE html>"));
    assert!(!outcome.artifact.contains("Enjoy!"));

    assert_eq!(outcome.extraction, ExtractionRule::HtmlFence);
    assert_eq!(outcome.seo.title.as_deref(), Some("Juniper Bakery"));
    assert_eq!(
        outcome.seo.description.as_deref(),
        Some("Sourdough and pastries baked daily.")
    );

    // Progress: monotonic, one ramp event per asset, ends at 100.
    let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
    assert_eq!(percents.first(), Some(&10));
    assert_eq!(percents.last(), Some(&100));

    let ramp: Vec<(u64, u64)> = events
        .iter()
        .filter_map(|e| e.payload.as_ref())
        .map(|p| (p["completed"].as_u64().unwrap(), p["total"].as_u64().unwrap()))
        .collect();
    assert_eq!(ramp, vec![(1, 3), (2, 3), (3, 3)]);

    // Run record walked every stage and kept the artifact.
    let record = recorder.run(&outcome.run_id).unwrap();
    assert_eq!(
        record.history,
        vec![
            RunStatus::Created,
            RunStatus::Skeleton,
            RunStatus::Assets,
            RunStatus::Assembly,
            RunStatus::Completed,
        ]
    );
    assert_eq!(record.progress, 100);
    assert_eq!(record.artifact.as_deref(), Some(outcome.artifact.as_str()));

    let audit = recorder.audit_entries();
    assert_eq!(audit.iter().filter(|e| e.stage == Stage::Skeleton).count(), 1);
    let asset_entries: Vec<_> = audit.iter().filter(|e| e.stage == Stage::Assets).collect();
    assert_eq!(asset_entries.len(), 3);
    let degraded = asset_entries.iter().find(|e| !e.succeeded).unwrap();
    assert_eq!(degraded.backend_id, "placeholder");
    assert!(asset_entries.iter().all(|e| e.estimated_units == 1));
}

#[tokio::test]
async fn test_unconfigured_text_backend_fails_stage_one_without_image_calls() {
    let calls = call_log();
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations]))
        .with_backend(ScriptedImageBackend::new(ImageProvider::Pollinations, &calls).shared());
    let recorder = Arc::new(MemoryRunRecorder::new());
    let orchestrator = StageOrchestrator::new(Arc::new(ProviderSkeletonGenerator::new()), synthesizer(chain, 4))
        .with_recorder(recorder.clone() as Arc<dyn RunRecorder>);

    let request = GenerationRequest::new(
        "A portfolio",
        ModelProvider::OpenAI {
            model: "gpt-4o".to_string(),
            api_key: "  ".to_string(),
            base_url: None,
        },
    );

    let mut events: Vec<ProgressEvent> = Vec::new();
    let err = orchestrator
        .generate(&request, &mut |event: &ProgressEvent| events.push(event.clone()))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Skeleton));
    match err {
        GenerationError::Stage(fatal) => {
            assert!(matches!(fatal.cause, StageFault::Provider(ProviderError::NotConfigured(_))));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(calls.lock().is_empty());
    assert!(events.iter().all(|e| e.percent <= 10));

    assert_eq!(recorder.run_count(), 1);
    let audit = recorder.audit_entries();
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].succeeded);

    let run_id = audit[0].run_id.clone();
    let record = recorder.run(&run_id).unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert!(!record.history.contains(&RunStatus::Completed));
    assert!(record.artifact.is_none());
}

#[tokio::test]
async fn test_blank_skeleton_is_fatal() {
    let calls = call_log();
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations]))
        .with_backend(ScriptedImageBackend::new(ImageProvider::Pollinations, &calls).shared());
    let orchestrator = StageOrchestrator::new(Arc::new(FixedSkeleton::new("   \n")), synthesizer(chain, 4));

    let err = orchestrator.run(&request("Anything")).await.unwrap_err();
    match err {
        GenerationError::Stage(fatal) => {
            assert_eq!(fatal.stage, Stage::Skeleton);
            assert!(matches!(fatal.cause, StageFault::Provider(ProviderError::EmptyDocument)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(calls.lock().is_empty());
}

#[tokio::test]
async fn test_text_backend_error_is_fatal() {
    let skeleton = Arc::new(FixedSkeleton::failing("connection reset"));
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations]));
    let orchestrator = StageOrchestrator::new(skeleton.clone(), synthesizer(chain, 4));

    let err = orchestrator.run(&request("Anything")).await.unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Skeleton));
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(skeleton.calls(), 1);
}

#[tokio::test]
async fn test_blank_prompt_is_rejected_before_any_stage() {
    let skeleton = Arc::new(FixedSkeleton::new(THREE_IMAGE_SKELETON));
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations]));
    let orchestrator = StageOrchestrator::new(skeleton.clone(), synthesizer(chain, 4));

    let err = orchestrator.run(&request("   ")).await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidRequest(_)));
    assert_eq!(err.stage(), None);
    assert_eq!(skeleton.calls(), 0);
}

#[tokio::test]
async fn test_unavailable_recorder_does_not_fail_the_run() {
    let calls = call_log();
    let orchestrator = bakery_orchestrator(&calls)
        .with_recorder(Arc::new(MemoryRunRecorder::unavailable()) as Arc<dyn RunRecorder>);

    let outcome = orchestrator
        .generate(&request("A neighbourhood bakery"), &mut |_: &ProgressEvent| {})
        .await
        .unwrap();
    assert!(outcome.run_id.starts_with("run-"));
    assert_eq!(outcome.summary().total, 3);
}

#[tokio::test]
async fn test_page_without_images_is_repaired_and_skips_the_ramp() {
    let calls = call_log();
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations]))
        .with_backend(ScriptedImageBackend::new(ImageProvider::Pollinations, &calls).shared());
    let skeleton = "<section class=\"p-8\"><h1>Coming soon</h1></section>";
    let orchestrator = StageOrchestrator::new(Arc::new(FixedSkeleton::new(skeleton)), synthesizer(chain, 4));

    let mut percents = Vec::new();
    let outcome = orchestrator
        .generate(&request("A teaser page"), &mut |event: &ProgressEvent| {
            percents.push(event.percent)
        })
        .await
        .unwrap();

    assert_eq!(percents, vec![10, 30, 85, 100]);
    assert_eq!(outcome.extraction, ExtractionRule::RawText);
    assert!(outcome.assets.is_empty());
    assert!(calls.lock().is_empty());

    let artifact = &outcome.artifact;
    assert!(artifact.starts_with("<!DOCTYPE html>"));
    assert!(artifact.contains("<html"));
    assert!(artifact.contains("<head>"));
    assert!(artifact.contains("cdn.tailwindcss.com"));
    assert!(artifact.contains("<h1>Coming soon</h1>"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_can_be_spawned_onto_the_runtime() {
    let calls = call_log();
    let orchestrator = Arc::new(bakery_orchestrator(&calls));

    let handle = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move {
            let request = request("A neighbourhood bakery");
            let mut percents = Vec::new();
            let outcome = orchestrator
                .generate(&request, &mut |event: &ProgressEvent| percents.push(event.percent))
                .await;
            outcome.map(|outcome| (outcome.summary().total, outcome.artifact, percents))
        }
    });

    let (total, artifact, percents) = handle.await.unwrap().unwrap();
    assert_eq!(total, 3);
    assert!(artifact.contains("https://pollinations.test/fresh-loaves"));
    assert_eq!(percents.last(), Some(&100));
    assert_eq!(calls.lock().len(), 4);
}

#[tokio::test]
async fn test_asset_audits_are_written_as_each_asset_settles() {
    let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
    let chain = FallbackChain::new(policy(vec![ImageProvider::Pollinations])).with_backend(Arc::new(PacedBackend {
        timeline: Arc::clone(&timeline),
    }));
    let recorder = Arc::new(TimelineRecorder {
        inner: MemoryRunRecorder::new(),
        timeline: Arc::clone(&timeline),
    });
    let orchestrator = StageOrchestrator::new(Arc::new(FixedSkeleton::new(THREE_IMAGE_SKELETON)), synthesizer(chain, 3))
        .with_recorder(recorder.clone() as Arc<dyn RunRecorder>);

    let outcome = orchestrator.generate(&request("A neighbourhood bakery"), &mut |_: &ProgressEvent| {}).await.unwrap();
    assert_eq!(outcome.summary().succeeded, 3);

    let timeline = timeline.lock().clone();
    let position = |prefix: &str| {
        timeline
            .iter()
            .position(|line| line.starts_with(prefix))
            .unwrap_or_else(|| panic!("{prefix:?} missing from {timeline:?}"))
    };
    // The quick assets are audited while the slow one is still in flight.
    assert!(position("audit fresh loaves") < position("resolved broken oven"), "{timeline:?}");
    assert!(position("audit croissant close-up") < position("resolved broken oven"), "{timeline:?}");
    assert!(position("resolved broken oven") < position("audit broken oven"), "{timeline:?}");
    assert_eq!(
        recorder.inner.audit_entries().iter().filter(|e| e.stage == Stage::Assets).count(),
        3
    );
}

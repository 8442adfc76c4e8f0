use crate::assembly::assemble;
use crate::error::{FatalStageError, GenerationError, StageFault};
use crate::image::{AssetRequest, AssetResult};
use crate::pipeline::progress::{Checkpoint, ProgressEvent, ProgressReporter};
use crate::pipeline::recorder::{estimate_units, new_run_id, AuditEntry, RunRecorder};
use crate::pipeline::state::{RunState, RunStatus};
use crate::pipeline::{GenerationOutcome, Stage};
use crate::request::GenerationRequest;
use crate::skeleton::{SkeletonDraft, SkeletonGenerator};
use crate::synthesis::{AssetSynthesizer, Settlement, SettlementSink};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Settlement sink for the asset stage: drives the progress ramp and hands each result
/// to the audit writer.
struct AssetSettlements<'r, 'a> {
    progress: &'r mut ProgressReporter<'a>,
    settled: UnboundedSender<AssetResult>,
}

impl SettlementSink for AssetSettlements<'_, '_> {
    fn settled(&mut self, settlement: Settlement<'_>) {
        if self.settled.unbounded_send(settlement.result.clone()).is_err() {
            debug!(asset_id = %settlement.result.id, "audit writer gone; settlement not recorded");
        }
        self.progress.asset_settled(settlement);
    }
}

fn asset_audit_entry(run_id: &str, requests: &[AssetRequest], result: &AssetResult) -> Option<AuditEntry> {
    let request = requests.iter().find(|request| request.id == result.id)?;
    let provider = result.provider_used.map(|p| p.as_str()).unwrap_or("placeholder");
    let entry = AuditEntry::new(run_id, Stage::Assets, provider, provider)
        .with_exchange(&request.spec().prompt(), &result.url)
        .with_units(1);
    if result.succeeded {
        Some(entry)
    } else {
        Some(entry.failed(result.error.clone().unwrap_or_else(|| "placeholder used".to_string())))
    }
}

/// Runs the three stages in strict sequence.
///
/// Skeleton and assembly failures abort the run with a [`FatalStageError`]. Asset
/// failures only degrade individual assets to placeholders.
pub struct StageOrchestrator {
    skeleton: Arc<dyn SkeletonGenerator>,
    synthesizer: AssetSynthesizer,
    recorder: Option<Arc<dyn RunRecorder>>,
}

impl StageOrchestrator {
    pub fn new(skeleton: Arc<dyn SkeletonGenerator>, synthesizer: AssetSynthesizer) -> Self {
        Self {
            skeleton,
            synthesizer,
            recorder: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn RunRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn synthesizer(&self) -> &AssetSynthesizer {
        &self.synthesizer
    }

    /// Artifact only, without progress reporting.
    pub async fn run(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let outcome = self.generate(request, &mut |_: &ProgressEvent| {}).await?;
        Ok(outcome.artifact)
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        on_progress: &mut (dyn FnMut(&ProgressEvent) + Send),
    ) -> Result<GenerationOutcome, GenerationError> {
        if request.prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("prompt is empty".to_string()));
        }

        let started = Instant::now();
        let run_id = self.open_run(request).await;
        let mut state = RunState::new(run_id);
        let mut reporter = ProgressReporter::new(on_progress);
        info!(run_id = %state.run_id(), text_backend = %request.text.provider_type(), "run started");

        match self.execute(request, &mut state, &mut reporter).await {
            Ok(outcome) => {
                let summary = outcome.summary();
                info!(
                    run_id = %outcome.run_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    assets = summary.total,
                    degraded = summary.degraded,
                    "run completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    run_id = %state.run_id(),
                    stage = %err.stage,
                    error = %err,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "run failed"
                );
                self.abort(&mut state, reporter.last_percent()).await;
                Err(err.into())
            }
        }
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        state: &mut RunState,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<GenerationOutcome, FatalStageError> {
        self.advance(state, RunStatus::Skeleton, Stage::Skeleton, None, Checkpoint::Started.percent())
            .await?;
        reporter.checkpoint(Checkpoint::Started);

        let draft = self.skeleton_stage(request, state.run_id()).await?;

        self.advance(state, RunStatus::Assets, Stage::Skeleton, None, Checkpoint::SkeletonReady.percent())
            .await?;
        reporter.checkpoint(Checkpoint::SkeletonReady);

        let (settled_tx, settled_rx) = mpsc::unbounded();
        let mut sink = AssetSettlements {
            progress: &mut *reporter,
            settled: settled_tx,
        };
        let assets = &draft.assets;
        let images = &request.images;
        let synthesis = async move {
            let batch = self
                .synthesizer
                .generate_all(assets, images.preferred, &images.credentials, &mut sink)
                .await;
            drop(sink);
            batch
        };
        let (batch, ()) = futures::join!(synthesis, self.audit_settlements(state.run_id(), assets, settled_rx));

        self.advance(state, RunStatus::Assembly, Stage::Assembly, None, Checkpoint::AssemblyStarted.percent())
            .await?;
        reporter.checkpoint(Checkpoint::AssemblyStarted);

        let artifact = catch_unwind(AssertUnwindSafe(|| assemble(&draft.document, &draft.assets, &batch)))
            .map_err(|_| FatalStageError::new(Stage::Assembly, StageFault::Internal("assembly panicked".to_string())))?;

        self.advance(
            state,
            RunStatus::Completed,
            Stage::Assembly,
            Some(&artifact),
            Checkpoint::Done.percent(),
        )
        .await?;
        reporter.checkpoint(Checkpoint::Done);

        Ok(GenerationOutcome {
            run_id: state.run_id().to_string(),
            artifact,
            seo: draft.seo,
            extraction: draft.rule,
            assets: batch,
        })
    }

    async fn skeleton_stage(&self, request: &GenerationRequest, run_id: &str) -> Result<SkeletonDraft, FatalStageError> {
        let backend_id = request.text.provider_type().to_string();
        let model = request.text.model().to_string();

        let response = match self.skeleton.generate(request).await {
            Ok(response) => response,
            Err(err) => {
                self.audit(AuditEntry::new(run_id, Stage::Skeleton, backend_id, model).failed(err.to_string()))
                    .await;
                return Err(FatalStageError::new(Stage::Skeleton, err));
            }
        };

        let entry = AuditEntry::new(run_id, Stage::Skeleton, response.backend_id.clone(), response.model.clone())
            .with_exchange(&response.prompt, &response.text)
            .with_units(estimate_units(response.usage, &response.prompt, &response.text));

        match SkeletonDraft::from_response(response, &request.prompt) {
            Ok(draft) => {
                self.audit(entry).await;
                info!(
                    run_id,
                    rule = ?draft.rule,
                    assets = draft.assets.len(),
                    document_chars = draft.document.chars().count(),
                    "skeleton ready"
                );
                Ok(draft)
            }
            Err(err) => {
                self.audit(entry.failed(err.to_string())).await;
                Err(FatalStageError::new(Stage::Skeleton, err))
            }
        }
    }

    /// Appends one audit entry per asset as each settles; ends once the sender is dropped.
    async fn audit_settlements(
        &self,
        run_id: &str,
        requests: &[AssetRequest],
        mut settled: UnboundedReceiver<AssetResult>,
    ) {
        while let Some(result) = settled.next().await {
            if let Some(entry) = asset_audit_entry(run_id, requests, &result) {
                self.audit(entry).await;
            }
        }
    }

    async fn open_run(&self, request: &GenerationRequest) -> String {
        let Some(recorder) = &self.recorder else {
            return new_run_id();
        };
        match recorder.create_run(request).await {
            Ok(run_id) => run_id,
            Err(err) => {
                let run_id = new_run_id();
                warn!(run_id = %run_id, error = %err, "failed to create run record; continuing with local id");
                run_id
            }
        }
    }

    async fn advance(
        &self,
        state: &mut RunState,
        next: RunStatus,
        stage: Stage,
        artifact: Option<&str>,
        progress: u8,
    ) -> Result<(), FatalStageError> {
        state
            .transition(next)
            .map_err(|err| FatalStageError::new(stage, StageFault::Internal(err.to_string())))?;
        self.record_status(state.run_id(), next, artifact, progress).await;
        Ok(())
    }

    async fn abort(&self, state: &mut RunState, progress: u8) {
        if state.status().is_terminal() {
            return;
        }
        if let Err(err) = state.transition(RunStatus::Failed) {
            warn!(run_id = %state.run_id(), error = %err, "could not mark run failed");
            return;
        }
        self.record_status(state.run_id(), RunStatus::Failed, None, progress).await;
    }

    async fn record_status(&self, run_id: &str, status: RunStatus, artifact: Option<&str>, progress: u8) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        if let Err(err) = recorder.update_run(run_id, status, artifact, progress).await {
            warn!(run_id, status = %status, error = %err, "failed to update run record");
        }
    }

    async fn audit(&self, entry: AuditEntry) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let run_id = entry.run_id.clone();
        let stage = entry.stage;
        if let Err(err) = recorder.append_audit(entry).await {
            warn!(run_id = %run_id, stage = %stage, error = %err, "failed to append audit entry");
        }
    }
}

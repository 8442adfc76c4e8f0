//! Asset Synthesis
//!
//! Fans asset requests out over the provider fallback chain and waits for every one of
//! them to settle. A request whose chain is exhausted still settles (with a placeholder);
//! one asset's failure never affects another's result or the batch as a whole.
//! Fan-out is bounded by an explicit concurrency limit.

use crate::image::{AssetRequest, AssetResult, FallbackChain, ImageProvider};
use crate::request::Credentials;
use futures::stream::{self, StreamExt};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

/// Progress notification for one settled asset.
#[derive(Debug, Clone, Copy)]
pub struct Settlement<'a> {
    pub completed: usize,
    pub total: usize,
    pub result: &'a AssetResult,
}

/// Receives one [`Settlement`] per asset as the batch resolves.
pub trait SettlementSink: Send {
    fn settled(&mut self, settlement: Settlement<'_>);
}

impl<F> SettlementSink for F
where
    F: FnMut(Settlement<'_>) + Send,
{
    fn settled(&mut self, settlement: Settlement<'_>) {
        self(settlement)
    }
}

/// All asset results for a run, keyed by asset id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetBatch {
    results: HashMap<String, AssetResult>,
}

impl AssetBatch {
    pub fn get(&self, id: &str) -> Option<&AssetResult> {
        self.results.get(id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.values().filter(|r| r.succeeded).count()
    }

    pub fn degraded_count(&self) -> usize {
        self.results.values().filter(|r| !r.succeeded).count()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.len(),
            succeeded: self.succeeded_count(),
            degraded: self.degraded_count(),
        }
    }

    pub fn into_results(self) -> HashMap<String, AssetResult> {
        self.results
    }

    fn insert(&mut self, result: AssetResult) {
        self.results.insert(result.id.clone(), result);
    }
}

impl FromIterator<AssetResult> for AssetBatch {
    fn from_iter<I: IntoIterator<Item = AssetResult>>(iter: I) -> Self {
        let mut batch = AssetBatch::default();
        for result in iter {
            batch.insert(result);
        }
        batch
    }
}

/// Structured view of partial degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub degraded: usize,
}

/// Coordinates concurrent resolution of a run's assets.
pub struct AssetSynthesizer {
    chain: FallbackChain,
    max_concurrency: usize,
}

impl AssetSynthesizer {
    pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

    /// `max_concurrency == 0` gives every request its own slot (no admission limit).
    pub fn new(chain: FallbackChain, max_concurrency: usize) -> Self {
        Self {
            chain,
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Resolve every request. Returns only after all of them settled; `on_settled` is
    /// called exactly once per settled asset, in settlement order.
    pub async fn generate_all(
        &self,
        requests: &[AssetRequest],
        preferred: ImageProvider,
        credentials: &Credentials,
        on_settled: &mut dyn SettlementSink,
    ) -> AssetBatch {
        let unique = distinct_by_id(requests);
        let total = unique.len();
        let mut batch = AssetBatch::default();
        if total == 0 {
            return batch;
        }

        let limit = match self.max_concurrency {
            0 => total,
            n => n.min(total),
        };
        info!(total, limit, preferred = %preferred, "asset synthesis started");

        let mut tasks: Vec<BoxFuture<'_, AssetResult>> = Vec::with_capacity(total);
        for request in unique {
            tasks.push(self.resolve_one(request, preferred, credentials).boxed());
        }
        let mut pending = stream::iter(tasks).buffer_unordered(limit);

        let mut completed = 0usize;
        while let Some(result) = pending.next().await {
            completed += 1;
            on_settled.settled(Settlement {
                completed,
                total,
                result: &result,
            });
            batch.insert(result);
        }

        let summary = batch.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            degraded = summary.degraded,
            "asset synthesis finished"
        );
        batch
    }

    async fn resolve_one(
        &self,
        request: &AssetRequest,
        preferred: ImageProvider,
        credentials: &Credentials,
    ) -> AssetResult {
        let spec = request.spec();
        let resolution = AssertUnwindSafe(self.chain.resolve(&spec, preferred, credentials))
            .catch_unwind()
            .await;
        match resolution {
            Ok(outcome) => outcome.into_asset_result(request.id.clone()),
            Err(_) => {
                error!(asset_id = %request.id, "image provider chain panicked; using placeholder");
                AssetResult {
                    id: request.id.clone(),
                    url: self.chain.placeholder_for(request),
                    succeeded: false,
                    provider_used: None,
                    attempts: 0,
                    error: Some("image provider chain panicked".to_string()),
                }
            }
        }
    }
}

fn distinct_by_id(requests: &[AssetRequest]) -> Vec<&AssetRequest> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(requests.len());
    for request in requests {
        if seen.insert(request.id.as_str()) {
            unique.push(request);
        } else {
            warn!(asset_id = %request.id, "duplicate asset id ignored");
        }
    }
    unique
}

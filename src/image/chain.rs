//! Provider fallback chain.
//!
//! Attempts the preferred provider first, then the remaining providers in the fixed
//! priority order, one sequential attempt each. Exhaustion resolves to the deterministic
//! placeholder URL; the chain itself never fails.

use crate::error::{AttemptError, AttemptErrorKind};
use crate::image::backends::{
    ImageBackend, OpenAiImageBackend, PollinationsBackend, StabilityBackend, UnsplashBackend,
};
use crate::image::placeholder::PlaceholderTable;
use crate::image::{AssetRequest, AssetResult, ImageProvider, ImageSpec};
use crate::request::Credentials;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Immutable chain configuration shared by every asset in a run.
#[derive(Debug, Clone)]
pub struct ChainPolicy {
    priority: Vec<ImageProvider>,
    placeholders: PlaceholderTable,
    attempt_timeout: Duration,
}

impl ChainPolicy {
    pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duplicate providers in `priority` keep their first position.
    pub fn new(priority: Vec<ImageProvider>, placeholders: PlaceholderTable, attempt_timeout: Duration) -> Self {
        let mut deduped = Vec::with_capacity(priority.len());
        for provider in priority {
            if !deduped.contains(&provider) {
                deduped.push(provider);
            }
        }
        Self {
            priority: deduped,
            placeholders,
            attempt_timeout,
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn priority(&self) -> &[ImageProvider] {
        &self.priority
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Preferred provider first, then the priority order without it.
    pub fn attempt_order(&self, preferred: ImageProvider) -> Vec<ImageProvider> {
        std::iter::once(preferred)
            .chain(self.priority.iter().copied().filter(|p| *p != preferred))
            .collect()
    }
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self::new(
            ImageProvider::DEFAULT_PRIORITY.to_vec(),
            PlaceholderTable::default(),
            Self::DEFAULT_ATTEMPT_TIMEOUT,
        )
    }
}

/// Result of resolving one asset through the chain.
#[derive(Debug, Clone)]
pub enum ChainOutcome {
    Resolved {
        url: String,
        provider: ImageProvider,
        failures: Vec<AttemptError>,
    },
    Exhausted {
        placeholder_url: String,
        failures: Vec<AttemptError>,
    },
}

impl ChainOutcome {
    pub fn url(&self) -> &str {
        match self {
            ChainOutcome::Resolved { url, .. } => url,
            ChainOutcome::Exhausted { placeholder_url, .. } => placeholder_url,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ChainOutcome::Resolved { .. })
    }

    pub fn provider(&self) -> Option<ImageProvider> {
        match self {
            ChainOutcome::Resolved { provider, .. } => Some(*provider),
            ChainOutcome::Exhausted { .. } => None,
        }
    }

    pub fn failures(&self) -> &[AttemptError] {
        match self {
            ChainOutcome::Resolved { failures, .. } | ChainOutcome::Exhausted { failures, .. } => failures,
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            ChainOutcome::Resolved { failures, .. } => failures.len() + 1,
            ChainOutcome::Exhausted { failures, .. } => failures.len(),
        }
    }

    pub fn into_asset_result(self, id: impl Into<String>) -> AssetResult {
        let attempts = self.attempts();
        match self {
            ChainOutcome::Resolved { url, provider, .. } => AssetResult {
                id: id.into(),
                url,
                succeeded: true,
                provider_used: Some(provider),
                attempts,
                error: None,
            },
            ChainOutcome::Exhausted {
                placeholder_url,
                failures,
            } => AssetResult {
                id: id.into(),
                url: placeholder_url,
                succeeded: false,
                provider_used: None,
                attempts,
                error: Some(
                    failures
                        .last()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "no image providers configured".to_string()),
                ),
            },
        }
    }
}

/// Ordered set of image backends plus the policy for walking them.
#[derive(Clone)]
pub struct FallbackChain {
    backends: HashMap<ImageProvider, Arc<dyn ImageBackend>>,
    policy: ChainPolicy,
}

impl FallbackChain {
    /// Empty chain: every resolution exhausts to a placeholder until backends are added.
    pub fn new(policy: ChainPolicy) -> Self {
        Self {
            backends: HashMap::new(),
            policy,
        }
    }

    /// Chain with the four built-in HTTP backends.
    pub fn standard(policy: ChainPolicy, verify_urls: bool) -> Result<Self, reqwest::Error> {
        Ok(Self::new(policy)
            .with_backend(Arc::new(OpenAiImageBackend::new(None, None)?))
            .with_backend(Arc::new(StabilityBackend::new(None)?))
            .with_backend(Arc::new(UnsplashBackend::new(None)?))
            .with_backend(Arc::new(PollinationsBackend::new(None, verify_urls)?)))
    }

    /// Registers a backend under its own provider id, replacing any previous one.
    pub fn with_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backends.insert(backend.provider(), backend);
        self
    }

    pub fn attempt_order(&self, preferred: ImageProvider) -> Vec<ImageProvider> {
        self.policy.attempt_order(preferred)
    }

    pub fn placeholder_for(&self, request: &AssetRequest) -> String {
        self.policy
            .placeholders
            .url_for(&request.description, request.aspect_ratio)
    }

    pub async fn resolve(
        &self,
        spec: &ImageSpec,
        preferred: ImageProvider,
        credentials: &Credentials,
    ) -> ChainOutcome {
        let mut failures = Vec::new();

        for provider in self.attempt_order(preferred) {
            let Some(backend) = self.backends.get(&provider) else {
                failures.push(AttemptError::new(
                    provider.as_str(),
                    AttemptErrorKind::Unavailable,
                    "no backend registered",
                ));
                continue;
            };

            debug!(provider = %provider, aspect = %spec.aspect_ratio, "image attempt started");
            let started = Instant::now();
            let attempt = tokio::time::timeout(
                self.policy.attempt_timeout,
                backend.generate(spec, credentials.get(provider)),
            )
            .await;

            match attempt {
                Ok(Ok(url)) => {
                    info!(
                        provider = %provider,
                        duration_ms = started.elapsed().as_millis() as u64,
                        failed_attempts = failures.len(),
                        "image resolved"
                    );
                    return ChainOutcome::Resolved {
                        url,
                        provider,
                        failures,
                    };
                }
                Ok(Err(err)) => {
                    warn!(provider = %provider, kind = ?err.kind, error = %err.message, "image attempt failed");
                    failures.push(err);
                }
                Err(_) => {
                    warn!(
                        provider = %provider,
                        timeout_ms = self.policy.attempt_timeout.as_millis() as u64,
                        "image attempt timed out"
                    );
                    failures.push(AttemptError::new(
                        provider.as_str(),
                        AttemptErrorKind::Timeout,
                        format!("no response within {:?}", self.policy.attempt_timeout),
                    ));
                }
            }
        }

        let placeholder_url = self
            .policy
            .placeholders
            .url_for(&spec.description, spec.aspect_ratio);
        warn!(
            attempts = failures.len(),
            aspect = %spec.aspect_ratio,
            "all image providers failed; using placeholder"
        );
        ChainOutcome::Exhausted {
            placeholder_url,
            failures,
        }
    }
}

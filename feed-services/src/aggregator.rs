//! Fallback Aggregator
//!
//! Walks the sources that support a capability in priority order and returns
//! the first usable result, tagged with the source that produced it. Sources
//! are tried one at a time; a failed source is logged and skipped, never
//! retried inline.

use std::sync::Arc;
use std::time::Duration;

use feed_core::{
    AcquisitionError, AcquisitionResult, Capability, FetchError, FetchParams, FetchResult, Game,
    Payload, SourceDescriptor, SourceFailure,
};
use feed_sources::SourceClient;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::rate_limiter::RateLimiters;

/// What to do when a source answers with zero records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultPolicy {
    /// An empty answer is a valid, final result
    #[default]
    AcceptEmpty,
    /// Keep looking; fall back to the first empty answer if nothing better turns up
    PreferNonEmpty,
}

/// Configuration for the FallbackAggregator
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregatorConfig {
    pub empty_result: EmptyResultPolicy,
}

/// Priority-ordered fallback over heterogeneous sources
pub struct FallbackAggregator {
    /// Sorted by (priority, name)
    sources: Vec<Arc<dyn SourceClient>>,
    limiters: Arc<RateLimiters>,
    config: AggregatorConfig,
}

impl FallbackAggregator {
    pub fn new(
        mut sources: Vec<Arc<dyn SourceClient>>,
        limiters: Arc<RateLimiters>,
        config: AggregatorConfig,
    ) -> Self {
        sources.sort_by(|a, b| {
            let (a, b) = (a.descriptor(), b.descriptor());
            (a.priority, &a.name).cmp(&(b.priority, &b.name))
        });

        info!(
            "[FALLBACK] {} sources, empty results: {:?}",
            sources.len(),
            config.empty_result
        );

        Self {
            sources,
            limiters,
            config,
        }
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().map(|s| s.descriptor())
    }

    pub fn limiters(&self) -> &Arc<RateLimiters> {
        &self.limiters
    }

    /// Sources consulted for a capability, in order
    pub fn chain(&self, capability: Capability, game: Game) -> Vec<&Arc<dyn SourceClient>> {
        self.sources
            .iter()
            .filter(|s| s.descriptor().supports(capability, game))
            .collect()
    }

    /// Fetch with a relative timeout
    pub async fn fetch_within(
        &self,
        capability: Capability,
        params: &FetchParams,
        timeout: Duration,
    ) -> AcquisitionResult<FetchResult<Payload>> {
        self.fetch(capability, params, Instant::now() + timeout).await
    }

    /// Fetch from the first source that succeeds before `deadline`
    ///
    /// When the deadline passes, the in-flight call is dropped and the
    /// failures collected so far are returned with the timeout, followed by
    /// a [`FailureKind::Timeout`](feed_core::FailureKind::Timeout) entry for
    /// the source that was still pending.
    pub async fn fetch(
        &self,
        capability: Capability,
        params: &FetchParams,
        deadline: Instant,
    ) -> AcquisitionResult<FetchResult<Payload>> {
        let started = Instant::now();
        let mut failures = Vec::new();
        let mut pending = None;

        let outcome = tokio::time::timeout_at(
            deadline,
            self.walk(capability, params, deadline, &mut failures, &mut pending),
        )
        .await;

        match outcome {
            Ok(Some(result)) => Ok(result),
            Ok(None) => {
                let err = AcquisitionError::SourceExhausted {
                    capability,
                    failures,
                };
                error!("[FALLBACK] {}", err);
                Err(err)
            }
            Err(_) => {
                let elapsed = started.elapsed();
                if let Some(name) = pending {
                    failures.push(SourceFailure::timed_out(name, elapsed));
                }
                let err = AcquisitionError::Timeout {
                    capability,
                    elapsed,
                    failures,
                };
                warn!("[FALLBACK] {}", err);
                Err(err)
            }
        }
    }

    /// `pending` names the source currently being waited on, if any
    async fn walk(
        &self,
        capability: Capability,
        params: &FetchParams,
        deadline: Instant,
        failures: &mut Vec<SourceFailure>,
        pending: &mut Option<String>,
    ) -> Option<FetchResult<Payload>> {
        let chain = self.chain(capability, params.game);
        if chain.is_empty() {
            warn!(
                "[FALLBACK] no source supports {} for {}",
                capability,
                params.game.display_name()
            );
        }

        let mut first_empty: Option<FetchResult<Payload>> = None;

        for source in chain {
            let name = source.name();
            *pending = Some(name.to_string());

            if let Err(e) = self.limiters.acquire(name, Some(deadline)).await {
                *pending = None;
                warn!("[FALLBACK] {} skipped for {}: {}", name, capability, e);
                failures.push(SourceFailure::from_error(name, &e));
                continue;
            }

            debug!("[FALLBACK] trying {} for {}", name, capability);
            let fetched = source.fetch(capability, params).await;
            *pending = None;
            let payload = match fetched {
                Ok(payload) if payload.capability() != capability => {
                    let e = FetchError::parse(format!(
                        "expected {} records, source returned {}",
                        capability,
                        payload.capability()
                    ));
                    warn!("[FALLBACK] {} failed for {}: {}", name, capability, e);
                    failures.push(SourceFailure::from_error(name, &e));
                    continue;
                }
                Ok(payload) => payload,
                Err(e) => {
                    warn!("[FALLBACK] {} failed for {}: {}", name, capability, e);
                    failures.push(SourceFailure::from_error(name, &e));
                    continue;
                }
            };

            if payload.is_empty() && self.config.empty_result == EmptyResultPolicy::PreferNonEmpty {
                info!(
                    "[FALLBACK] {} returned no {} records, trying next source",
                    name, capability
                );
                failures.push(SourceFailure::empty(name));
                first_empty.get_or_insert_with(|| FetchResult::fresh(payload, name));
                continue;
            }

            info!(
                "[FALLBACK] {} served {} {} records",
                name,
                payload.len(),
                capability
            );
            return Some(FetchResult::fresh(payload, name));
        }

        if let Some(result) = &first_empty {
            info!(
                "[FALLBACK] no source had {} records, returning empty result from {}",
                capability, result.source_name
            );
        }
        first_empty
    }
}

//! Enrichment pipeline driving batches through the fetcher.

use std::sync::Arc;

use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::EnrichmentConfig,
    error::FetchFailure,
    fetcher::{DetailMap, RateLimitedFetcher},
    models::{AppId, Game},
    planner::{Batch, BatchPlanner},
    services::CatalogService,
};

/// Execution strategy for bulk enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// One batch at a time with a fixed pause in between.
    #[serde(rename = "sequential")]
    Sequential,
    /// All batches at once, each start offset by `index × stagger`.
    #[serde(rename = "parallel", alias = "parallel-staggered")]
    ParallelStaggered,
}

/// What to do when a batch exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole call with the first failure.
    AllOrNothing,
    /// Record the failure and keep going.
    SkipFailed,
}

/// Merged result of a bulk enrichment call.
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    /// Details per id for every batch that succeeded.
    pub details: DetailMap,
    /// Batches that failed, only populated under [`FailurePolicy::SkipFailed`].
    pub failures: Vec<FetchFailure>,
}

impl EnrichmentReport {
    fn merge(&mut self, details: DetailMap) {
        self.details.extend(details);
    }

    /// Attach the collected details to matching games.
    ///
    /// Games without details in this report are left untouched.
    pub fn apply_to(&self, games: &[Game]) -> Vec<Game> {
        games
            .iter()
            .map(|game| match self.details.get(&game.appid) {
                Some(Some(details)) => game.with_details(details.clone()),
                _ => game.clone(),
            })
            .collect()
    }
}

/// Outcome of a progressive enrichment run.
#[derive(Debug, Default)]
pub struct ProgressReport {
    /// Input games with whatever details were attached.
    pub games: Vec<Game>,
    /// Games that received details during this run.
    pub enriched: usize,
    /// Games the catalog answered for without usable details.
    pub unavailable: Vec<AppId>,
    /// Games whose request exhausted its retries.
    pub failed: Vec<AppId>,
    /// Whether the run stopped on a cancellation request.
    pub cancelled: bool,
}

/// Drives id batches through a [`RateLimitedFetcher`].
#[derive(Clone)]
pub struct EnrichmentPipeline {
    fetcher: RateLimitedFetcher,
    config: EnrichmentConfig,
}

impl EnrichmentPipeline {
    /// Build a pipeline from an existing fetcher.
    pub fn new(fetcher: RateLimitedFetcher, config: EnrichmentConfig) -> Self {
        Self { fetcher, config }
    }

    /// Build a pipeline whose fetcher retries `config.max_retries` times.
    pub fn from_catalog(catalog: Arc<dyn CatalogService>, config: EnrichmentConfig) -> Self {
        let fetcher = RateLimitedFetcher::new(catalog, config.max_retries);
        Self::new(fetcher, config)
    }

    /// Active tunables.
    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Enrich `ids` in batches using `strategy`.
    pub async fn enrich(
        &self,
        ids: &[AppId],
        strategy: Strategy,
        policy: FailurePolicy,
    ) -> Result<EnrichmentReport, FetchFailure> {
        let batches = BatchPlanner::plan(ids, self.config.batch_size(strategy));
        info!(
            ids = ids.len(),
            batches = batches.len(),
            ?strategy,
            "starting enrichment"
        );

        let report = match strategy {
            Strategy::Sequential => self.run_sequential(batches, policy).await?,
            Strategy::ParallelStaggered => self.run_parallel(batches, policy).await?,
        };

        info!(
            resolved = report.details.len(),
            failed_batches = report.failures.len(),
            "enrichment finished"
        );
        Ok(report)
    }

    async fn run_sequential(
        &self,
        batches: Vec<Batch>,
        policy: FailurePolicy,
    ) -> Result<EnrichmentReport, FetchFailure> {
        let mut report = EnrichmentReport::default();
        for batch in batches {
            if batch.index > 0 {
                sleep(self.config.inter_batch_delay()).await;
            }
            debug!(batch = batch.index, ids = ?batch.ids, "fetching batch");
            let result = self.fetcher.fetch(&batch.ids).await;
            record(&mut report, batch.index, result, policy)?;
        }
        Ok(report)
    }

    async fn run_parallel(
        &self,
        batches: Vec<Batch>,
        policy: FailurePolicy,
    ) -> Result<EnrichmentReport, FetchFailure> {
        let origin = Instant::now();
        let stagger = self.config.stagger();
        let fetcher = &self.fetcher;

        let mut results: Vec<(usize, Result<DetailMap, FetchFailure>)> = stream::iter(batches)
            .map(|batch| async move {
                sleep_until(origin + batch.start_offset(stagger)).await;
                debug!(batch = batch.index, ids = ?batch.ids, "fetching batch");
                (batch.index, fetcher.fetch(&batch.ids).await)
            })
            .buffer_unordered(self.config.max_concurrent_batches.max(1))
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut report = EnrichmentReport::default();
        for (index, result) in results {
            record(&mut report, index, result, policy)?;
        }
        Ok(report)
    }

    /// Enrich `games` one at a time, calling `on_item` after each success.
    ///
    /// A failed item is skipped without a callback. Cancellation is honoured
    /// only between items; a request in flight always completes. Games that
    /// already carry details are passed through without a request.
    pub async fn enrich_progressively<F>(
        &self,
        games: Vec<Game>,
        cancel: &CancellationToken,
        mut on_item: F,
    ) -> ProgressReport
    where
        F: FnMut(&Game),
    {
        let mut report = ProgressReport {
            games,
            ..ProgressReport::default()
        };
        let mut requested = false;

        for index in 0..report.games.len() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if report.games[index].is_enriched() {
                continue;
            }
            if requested {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = sleep(self.config.item_delay()) => {}
                }
            }
            requested = true;

            let appid = report.games[index].appid;
            match self.fetcher.fetch(&[appid]).await {
                Ok(mut details) => match details.remove(&appid).flatten() {
                    Some(details) => {
                        let updated = report.games[index].with_details(details);
                        report.games[index] = updated;
                        report.enriched += 1;
                        on_item(&report.games[index]);
                    }
                    None => {
                        debug!(appid, "no catalog details available");
                        report.unavailable.push(appid);
                    }
                },
                Err(failure) => {
                    warn!(appid, "skipping game: {failure}");
                    report.failed.push(appid);
                }
            }
        }

        if report.cancelled {
            info!(enriched = report.enriched, "progressive enrichment cancelled");
        } else {
            info!(
                enriched = report.enriched,
                unavailable = report.unavailable.len(),
                failed = report.failed.len(),
                "progressive enrichment finished"
            );
        }
        report
    }
}

fn record(
    report: &mut EnrichmentReport,
    index: usize,
    result: Result<DetailMap, FetchFailure>,
    policy: FailurePolicy,
) -> Result<(), FetchFailure> {
    match (result, policy) {
        (Ok(details), _) => report.merge(details),
        (Err(failure), FailurePolicy::AllOrNothing) => return Err(failure),
        (Err(failure), FailurePolicy::SkipFailed) => {
            warn!(batch = index, "batch skipped: {failure}");
            report.failures.push(failure);
        }
    }
    Ok(())
}

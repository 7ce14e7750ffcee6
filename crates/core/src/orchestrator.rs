//! Sequencing of one analysis run, from vanity name to recommendation.

use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use rand::Rng;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    cache::SessionCache,
    config::AppConfig,
    error::{AnalysisError, Result},
    filter::{Filter, FilterEngine},
    models::{AppId, Game, Recommendation, UserId},
    pipeline::{EnrichmentPipeline, FailurePolicy, Strategy},
    services::{CatalogService, IdentityResolver, LibraryResponse, LibraryService},
    steam::SteamClient,
};

/// Lifecycle of a single analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisState {
    /// Nothing started yet.
    Idle,
    /// Looking up the account id.
    ResolvingIdentity,
    /// Listing owned games.
    FetchingLibrary,
    /// Selecting low-playtime candidates.
    Filtering,
    /// Candidates are visible; details arrive in the background.
    EnrichingProgressively,
    /// All work for the run is done.
    Ready,
    /// Run aborted before enrichment started.
    Failed(String),
}

/// Notifications emitted while a run progresses.
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    /// The run moved to a new state.
    StateChanged(AnalysisState),
    /// A game received catalog details.
    GameEnriched(Game),
    /// Background enrichment ended.
    Finished(EnrichmentSummary),
}

/// Totals of a progressive enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    /// Candidates handed to enrichment.
    pub total: usize,
    /// Games that received details.
    pub enriched: usize,
    /// Games without catalog details.
    pub unavailable: Vec<AppId>,
    /// Games whose requests exhausted their retries.
    pub failed: Vec<AppId>,
    /// Whether the run was cancelled before finishing.
    pub cancelled: bool,
}

#[derive(Clone)]
struct Progress {
    state: Arc<RwLock<AnalysisState>>,
    events: Option<mpsc::UnboundedSender<AnalysisEvent>>,
}

impl Progress {
    fn new(events: Option<mpsc::UnboundedSender<AnalysisEvent>>) -> Self {
        Self {
            state: Arc::new(RwLock::new(AnalysisState::Idle)),
            events,
        }
    }

    fn set(&self, state: AnalysisState) {
        debug!(?state, "analysis state changed");
        *self.state.write() = state.clone();
        self.emit(AnalysisEvent::StateChanged(state));
    }

    fn fail(&self, err: &AnalysisError) {
        error!("analysis failed: {err}");
        self.set(AnalysisState::Failed(err.to_string()));
    }

    fn emit(&self, event: AnalysisEvent) {
        if let Some(events) = &self.events {
            // Receiver may have gone away; the run continues regardless.
            let _ = events.send(event);
        }
    }

    fn current(&self) -> AnalysisState {
        self.state.read().clone()
    }
}

/// Live view of a progressive analysis.
pub struct AnalysisHandle {
    username: String,
    user_id: UserId,
    games: Arc<RwLock<Arc<Vec<Game>>>>,
    progress: Progress,
    cancel: CancellationToken,
    task: JoinHandle<EnrichmentSummary>,
}

impl AnalysisHandle {
    /// Username the run was started for.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Resolved account id.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Current candidate list. Each call returns a consistent snapshot.
    pub fn games(&self) -> Arc<Vec<Game>> {
        self.games.read().clone()
    }

    /// Current run state.
    pub fn state(&self) -> AnalysisState {
        self.progress.current()
    }

    /// Ask background enrichment to stop before its next item.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether background enrichment has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for background enrichment to end.
    pub async fn wait(self) -> anyhow::Result<EnrichmentSummary> {
        self.task.await.context("enrichment task panicked")
    }
}

/// Runs analyses and answers recommendation queries.
pub struct Orchestrator {
    identity: Arc<dyn IdentityResolver>,
    library: Arc<dyn LibraryService>,
    pipeline: EnrichmentPipeline,
    cache: Arc<dyn SessionCache>,
    filter: FilterEngine,
    max_items: usize,
    low_playtime_minutes: u32,
}

impl Orchestrator {
    /// Wire the collaborators using limits and tunables from `config`.
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        library: Arc<dyn LibraryService>,
        catalog: Arc<dyn CatalogService>,
        cache: Arc<dyn SessionCache>,
        config: &AppConfig,
    ) -> Self {
        Self {
            identity,
            library,
            pipeline: EnrichmentPipeline::from_catalog(catalog, config.enrichment.clone()),
            cache,
            filter: FilterEngine::new(config.low_playtime_minutes),
            max_items: config.max_items,
            low_playtime_minutes: config.low_playtime_minutes,
        }
    }

    /// Use one [`SteamClient`] for identity, library and catalog lookups.
    pub fn with_steam(client: SteamClient, cache: Arc<dyn SessionCache>, config: &AppConfig) -> Self {
        let client = Arc::new(client);
        Self::new(client.clone(), client.clone(), client, cache, config)
    }

    /// Run the whole analysis and return once every candidate was enriched.
    ///
    /// Any batch that exhausts its retries aborts the call. The unenriched
    /// candidates replace any earlier snapshot before enrichment starts.
    pub async fn analyze(&self, username: &str, strategy: Strategy) -> Result<Vec<Game>> {
        let progress = Progress::new(None);
        let (_, candidates) = self.load_candidates(username, &progress).await?;
        self.save(username, &candidates).await?;

        let ids: Vec<AppId> = candidates.iter().map(|game| game.appid).collect();
        let report = match self
            .pipeline
            .enrich(&ids, strategy, FailurePolicy::AllOrNothing)
            .await
        {
            Ok(report) => report,
            Err(failure) => {
                let err = AnalysisError::from(failure);
                progress.fail(&err);
                return Err(err);
            }
        };

        let games = report.apply_to(&candidates);
        self.save(username, &games).await?;
        progress.set(AnalysisState::Ready);
        info!(
            username,
            candidates = games.len(),
            enriched = games.iter().filter(|g| g.is_enriched()).count(),
            "analysis complete"
        );
        Ok(games)
    }

    /// Surface the candidate list now and enrich it in the background.
    ///
    /// Identity and library failures are returned directly and nothing is
    /// spawned. The cache is updated after every enriched game.
    pub async fn analyze_progressively(
        &self,
        username: &str,
        events: Option<mpsc::UnboundedSender<AnalysisEvent>>,
    ) -> Result<AnalysisHandle> {
        let progress = Progress::new(events);
        let (user_id, candidates) = self.load_candidates(username, &progress).await?;
        self.save(username, &candidates).await?;

        let games = Arc::new(RwLock::new(Arc::new(candidates.clone())));
        let cancel = CancellationToken::new();
        progress.set(AnalysisState::EnrichingProgressively);

        let task = tokio::spawn(enrich_in_background(
            self.pipeline.clone(),
            self.cache.clone(),
            username.to_string(),
            candidates,
            games.clone(),
            progress.clone(),
            cancel.clone(),
        ));

        Ok(AnalysisHandle {
            username: username.to_string(),
            user_id,
            games,
            progress,
            cancel,
            task,
        })
    }

    /// Recommend a game from whatever is cached for `username`.
    ///
    /// Never waits on enrichment that is still running.
    pub fn recommend<R: Rng>(
        &self,
        username: &str,
        filter: Filter,
        rng: &mut R,
    ) -> Result<Recommendation> {
        let games = self
            .cache
            .load(username)
            .map_err(|err| AnalysisError::Cache(format!("{err:#}")))?
            .ok_or_else(|| AnalysisError::NotLoaded(username.to_string()))?;

        let recommendation = self.filter.recommend(&games, filter, rng)?;
        info!(username, %filter, appid = recommendation.appid, "recommended game");
        Ok(recommendation)
    }

    /// Forget the cached analysis for `username`.
    pub fn clear(&self, username: &str) -> Result<()> {
        self.cache
            .clear(username)
            .map_err(|err| AnalysisError::Cache(format!("{err:#}")))
    }

    /// Forget every cached analysis.
    pub fn clear_all(&self) -> Result<()> {
        self.cache
            .clear_all()
            .map_err(|err| AnalysisError::Cache(format!("{err:#}")))
    }

    async fn save(&self, username: &str, games: &[Game]) -> Result<()> {
        persist(
            self.cache.clone(),
            username.to_string(),
            Arc::new(games.to_vec()),
        )
        .await
        .map_err(|err| AnalysisError::Cache(format!("{err:#}")))
    }

    async fn load_candidates(
        &self,
        username: &str,
        progress: &Progress,
    ) -> Result<(UserId, Vec<Game>)> {
        let result = self.resolve_and_filter(username, progress).await;
        if let Err(err) = &result {
            progress.fail(err);
        }
        result
    }

    async fn resolve_and_filter(
        &self,
        username: &str,
        progress: &Progress,
    ) -> Result<(UserId, Vec<Game>)> {
        progress.set(AnalysisState::ResolvingIdentity);
        let user_id = self
            .identity
            .resolve(username.trim())
            .await
            .map_err(|err| AnalysisError::Upstream(format!("failed to resolve username: {err:#}")))?
            .ok_or_else(|| AnalysisError::NotFound(username.to_string()))?;

        progress.set(AnalysisState::FetchingLibrary);
        let library = match self
            .library
            .owned_games(&user_id)
            .await
            .map_err(|err| AnalysisError::Upstream(format!("failed to fetch library: {err:#}")))?
        {
            LibraryResponse::Games(games) => games,
            LibraryResponse::PrivateOrEmpty => {
                return Err(AnalysisError::PrivateOrEmpty(user_id.to_string()))
            }
        };

        progress.set(AnalysisState::Filtering);
        let owned = library.len();
        let mut candidates: Vec<Game> = library
            .into_iter()
            .filter(|game| game.playtime_minutes < self.low_playtime_minutes)
            .collect();
        if candidates.is_empty() {
            return Err(AnalysisError::NoLowPlaytimeGames(self.low_playtime_minutes));
        }
        if candidates.len() > self.max_items {
            warn!(
                found = candidates.len(),
                limit = self.max_items,
                "truncating candidate list"
            );
            candidates.truncate(self.max_items);
        }

        info!(
            username,
            steamid = %user_id,
            owned,
            candidates = candidates.len(),
            "library loaded"
        );
        Ok((user_id, candidates))
    }
}

async fn enrich_in_background(
    pipeline: EnrichmentPipeline,
    cache: Arc<dyn SessionCache>,
    username: String,
    candidates: Vec<Game>,
    games: Arc<RwLock<Arc<Vec<Game>>>>,
    progress: Progress,
    cancel: CancellationToken,
) -> EnrichmentSummary {
    let total = candidates.len();
    let (snapshots, pending) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_snapshots(cache, username, pending));

    let report = pipeline
        .enrich_progressively(candidates, &cancel, |game| {
            let next = {
                let current = games.read();
                let mut next = (**current).clone();
                if let Some(slot) = next.iter_mut().find(|g| g.appid == game.appid) {
                    *slot = game.clone();
                }
                Arc::new(next)
            };
            let _ = snapshots.send(next.clone());
            *games.write() = next;
            progress.emit(AnalysisEvent::GameEnriched(game.clone()));
        })
        .await;

    drop(snapshots);
    if let Err(err) = writer.await {
        warn!("snapshot writer stopped early: {err}");
    }

    let summary = EnrichmentSummary {
        total,
        enriched: report.enriched,
        unavailable: report.unavailable,
        failed: report.failed,
        cancelled: report.cancelled,
    };
    progress.set(AnalysisState::Ready);
    progress.emit(AnalysisEvent::Finished(summary.clone()));
    summary
}

/// Store `games` from the blocking pool; file caches do synchronous I/O.
async fn persist(
    cache: Arc<dyn SessionCache>,
    username: String,
    games: Arc<Vec<Game>>,
) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || cache.save(&username, &games))
        .await
        .context("snapshot writer panicked")?
}

/// Persist progress in arrival order, skipping to the newest pending list.
async fn write_snapshots(
    cache: Arc<dyn SessionCache>,
    username: String,
    mut pending: mpsc::UnboundedReceiver<Arc<Vec<Game>>>,
) {
    while let Some(mut latest) = pending.recv().await {
        while let Ok(newer) = pending.try_recv() {
            latest = newer;
        }
        if let Err(err) = persist(cache.clone(), username.clone(), latest).await {
            warn!(username = %username, "failed to cache enrichment progress: {err:#}");
        }
    }
}

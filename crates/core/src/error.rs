//! Error taxonomy for a single analysis run.

use std::fmt;

use thiserror::Error;

use crate::{filter::Filter, models::AppId};

/// Enrichment batch that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Ids that were part of the failed request.
    pub ids: Vec<AppId>,
    /// Total number of attempts made, including the first.
    pub attempts: u32,
    /// Message of the last error seen.
    pub reason: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = self
            .ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "details for [{ids}] failed after {} attempt(s): {}",
            self.attempts, self.reason
        )
    }
}

impl std::error::Error for FetchFailure {}

/// Failures surfaced to the caller of an analysis or recommendation.
///
/// None of these are fatal to the process; each is scoped to one run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Vanity name could not be resolved.
    #[error("user not found: {0}")]
    NotFound(String),

    /// Library is private or contains no games.
    #[error("library is private or no games found for {0}")]
    PrivateOrEmpty(String),

    /// Library loaded but nothing is below the playtime threshold.
    #[error("no games with less than {0} minutes of playtime found")]
    NoLowPlaytimeGames(u32),

    /// Enrichment batch exhausted its retries in all-or-nothing mode.
    #[error("enrichment failed: {0}")]
    FetchFailure(#[from] FetchFailure),

    /// Filter left no candidates.
    #[error("no games found matching filter: {0}")]
    NoMatch(Filter),

    /// Recommendation requested before any analysis was stored.
    #[error("no analysis loaded for {0}")]
    NotLoaded(String),

    /// Transport failure talking to the identity or library service.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Session cache could not be read or written.
    #[error("session cache error: {0}")]
    Cache(String),
}

/// Result alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

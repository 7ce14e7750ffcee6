//! Single catalog request with bounded retry.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use crate::{
    error::FetchFailure,
    models::{AppId, GameDetails},
    services::CatalogService,
};

/// Requested id → details, `None` when the catalog had nothing for it.
pub type DetailMap = HashMap<AppId, Option<GameDetails>>;

/// Issues catalog requests, retrying failed ones immediately.
#[derive(Clone)]
pub struct RateLimitedFetcher {
    catalog: Arc<dyn CatalogService>,
    max_retries: u32,
}

impl RateLimitedFetcher {
    /// Wrap `catalog`, allowing `max_retries` extra attempts per request.
    pub fn new(catalog: Arc<dyn CatalogService>, max_retries: u32) -> Self {
        Self {
            catalog,
            max_retries,
        }
    }

    /// Extra attempts allowed after a failed request.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fetch details for `ids` in one request.
    ///
    /// Every requested id is present in the result. Ids the catalog omitted or
    /// flagged unsuccessful map to `None`; only transport or payload faults that
    /// outlive the retries produce a [`FetchFailure`].
    pub async fn fetch(&self, ids: &[AppId]) -> Result<DetailMap, FetchFailure> {
        if ids.is_empty() {
            return Ok(DetailMap::new());
        }

        let mut remaining = self.max_retries;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.catalog.details(ids).await {
                Ok(mut entries) => {
                    debug!(?ids, attempt, "catalog request succeeded");
                    return Ok(ids
                        .iter()
                        .map(|id| {
                            let details = entries.remove(id).and_then(|entry| entry.into_details());
                            (*id, details)
                        })
                        .collect());
                }
                Err(err) if remaining > 0 => {
                    remaining -= 1;
                    warn!(?ids, attempt, remaining, "catalog request failed, retrying: {err:#}");
                }
                Err(err) => {
                    return Err(FetchFailure {
                        ids: ids.to_vec(),
                        attempts: attempt,
                        reason: format!("{err:#}"),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{models::Descriptor, services::CatalogEntry};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Catalog double with scripted outcomes.
    #[derive(Default)]
    pub(crate) struct ScriptedCatalog {
        /// Ids whose requests always fail at the transport level.
        pub failing: HashSet<AppId>,
        /// Ids answered with the unsuccessful marker.
        pub unsuccessful: HashSet<AppId>,
        /// Number of leading calls that fail regardless of ids.
        pub flaky_calls: Mutex<u32>,
        /// Every request received, in order.
        pub calls: Mutex<Vec<Vec<AppId>>>,
    }

    impl ScriptedCatalog {
        pub(crate) fn failing(ids: impl IntoIterator<Item = AppId>) -> Self {
            Self {
                failing: ids.into_iter().collect(),
                ..Self::default()
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    pub(crate) fn details_for(id: AppId) -> GameDetails {
        GameDetails {
            genres: vec![Descriptor::new(format!("Genre {id}"))],
            ..GameDetails::default()
        }
    }

    #[async_trait]
    impl CatalogService for ScriptedCatalog {
        async fn details(&self, ids: &[AppId]) -> Result<HashMap<AppId, CatalogEntry>> {
            self.calls.lock().push(ids.to_vec());
            {
                let mut flaky = self.flaky_calls.lock();
                if *flaky > 0 {
                    *flaky -= 1;
                    return Err(anyhow!("connection reset"));
                }
            }
            if ids.iter().any(|id| self.failing.contains(id)) {
                return Err(anyhow!("HTTP 500"));
            }
            Ok(ids
                .iter()
                .map(|id| {
                    let entry = if self.unsuccessful.contains(id) {
                        CatalogEntry::Unsuccessful
                    } else {
                        CatalogEntry::Details(details_for(*id))
                    };
                    (*id, entry)
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let catalog = Arc::new(ScriptedCatalog {
            flaky_calls: Mutex::new(1),
            ..ScriptedCatalog::default()
        });
        let fetcher = RateLimitedFetcher::new(catalog.clone(), 1);

        let result = fetcher.fetch(&[7]).await.expect("second attempt succeeds");
        assert_eq!(result[&7], Some(details_for(7)));
        assert_eq!(catalog.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_report_batch_ids() {
        let catalog = Arc::new(ScriptedCatalog::failing([3]));
        let fetcher = RateLimitedFetcher::new(catalog.clone(), 2);

        let failure = fetcher.fetch(&[3, 4]).await.unwrap_err();
        assert_eq!(failure.ids, vec![3, 4]);
        assert_eq!(failure.attempts, 3);
        assert!(failure.reason.contains("HTTP 500"));
        assert_eq!(catalog.call_count(), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let catalog = Arc::new(ScriptedCatalog::failing([1]));
        let fetcher = RateLimitedFetcher::new(catalog.clone(), 0);

        assert!(fetcher.fetch(&[1]).await.is_err());
        assert_eq!(catalog.call_count(), 1);
    }

    #[tokio::test]
    async fn unsuccessful_marker_is_absence_not_failure() {
        let catalog = Arc::new(ScriptedCatalog {
            unsuccessful: [5].into_iter().collect(),
            ..ScriptedCatalog::default()
        });
        let fetcher = RateLimitedFetcher::new(catalog.clone(), 1);

        let result = fetcher.fetch(&[5, 6]).await.expect("fetch succeeds");
        assert_eq!(result[&5], None);
        assert_eq!(result[&6], Some(details_for(6)));
        assert_eq!(catalog.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_request_skips_the_catalog() {
        let catalog = Arc::new(ScriptedCatalog::default());
        let fetcher = RateLimitedFetcher::new(catalog.clone(), 1);

        assert!(fetcher.fetch(&[]).await.expect("empty fetch").is_empty());
        assert_eq!(catalog.call_count(), 0);
    }
}

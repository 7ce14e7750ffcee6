//! External collaborators the analysis core depends on.
//!
//! Transport faults are reported through the `Err` side of each call. Domain
//! outcomes such as "user not found" or "details unavailable" are part of the
//! success type so the two can never be confused.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AppId, Game, GameDetails, UserId};

/// Resolves vanity names to stable account ids.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns `None` when no account uses `vanity_name`.
    async fn resolve(&self, vanity_name: &str) -> Result<Option<UserId>>;
}

/// Outcome of a library lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryResponse {
    /// Owned games in the order reported by the service.
    Games(Vec<Game>),
    /// Profile is private or owns nothing.
    PrivateOrEmpty,
}

/// Lists the games owned by an account.
#[async_trait]
pub trait LibraryService: Send + Sync {
    /// Fetch every owned title for `user_id`.
    async fn owned_games(&self, user_id: &UserId) -> Result<LibraryResponse>;
}

/// Per-id entry of a catalog response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEntry {
    /// Full details for the title.
    Details(GameDetails),
    /// Service answered but flagged the id as unsuccessful.
    Unsuccessful,
}

impl CatalogEntry {
    /// Details if present.
    pub fn into_details(self) -> Option<GameDetails> {
        match self {
            CatalogEntry::Details(details) => Some(details),
            CatalogEntry::Unsuccessful => None,
        }
    }
}

/// Per-title metadata lookups.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Look up details for one or more ids in a single request.
    ///
    /// Ids missing from the returned map have no details available.
    async fn details(&self, ids: &[AppId]) -> Result<HashMap<AppId, CatalogEntry>>;
}

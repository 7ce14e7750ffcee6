#![warn(clippy::all, missing_docs)]

//! Core logic for gamepicker.
//!
//! This crate resolves a Steam vanity name, loads the owned library, enriches
//! low-playtime titles with storefront metadata under rate limits, and picks a
//! recommendation from the enriched set. Frontends drive it through
//! [`Orchestrator`].

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod planner;
pub mod services;
pub mod steam;

pub use cache::{FileSessionCache, MemorySessionCache, SessionCache};
pub use config::{AppConfig, EnrichmentConfig};
pub use error::{AnalysisError, FetchFailure};
pub use filter::{Filter, FilterEngine};
pub use models::{AppId, EnrichedSnapshot, Game, GameDetails, Recommendation, UserId};
pub use orchestrator::{AnalysisEvent, AnalysisHandle, AnalysisState, EnrichmentSummary, Orchestrator};
pub use pipeline::{EnrichmentPipeline, FailurePolicy, Strategy};
pub use steam::SteamClient;

//! Steam Web API and storefront integration.

/// HTTP client implementing the service traits.
pub mod client;
/// Payload decoding for the Steam endpoints.
pub mod payload;

pub use client::SteamClient;

use std::{collections::HashMap, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::payload;
use crate::{
    models::{AppId, UserId},
    services::{CatalogEntry, CatalogService, IdentityResolver, LibraryResponse, LibraryService},
};

const STEAM_API_BASE_URL: &str = "https://api.steampowered.com";
const STORE_API_BASE_URL: &str = "https://store.steampowered.com/api";
const USER_AGENT: &str = concat!("gamepicker/", env!("CARGO_PKG_VERSION"));

/// Steam Web API and storefront client.
///
/// Identity and library lookups require an API key; catalog lookups do not.
#[derive(Debug, Clone)]
pub struct SteamClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    store_base: String,
}

impl SteamClient {
    /// Build a client with the given key and per-request timeout.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_base: STEAM_API_BASE_URL.to_string(),
            store_base: STORE_API_BASE_URL.to_string(),
        })
    }

    /// Point the client at alternative hosts.
    pub fn with_base_urls(mut self, api_base: impl Into<String>, store_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.store_base = store_base.into();
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Steam API key not configured"))
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{url} returned HTTP {}", status.as_u16());
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("{url} returned a non-JSON body"))
    }
}

#[async_trait]
impl IdentityResolver for SteamClient {
    async fn resolve(&self, vanity_name: &str) -> Result<Option<UserId>> {
        let url = format!("{}/ISteamUser/ResolveVanityURL/v1/", self.api_base);
        debug!(vanity = %vanity_name, "resolving vanity name");
        let body = self
            .get_json(&url, &[("key", self.api_key()?), ("vanityurl", vanity_name)])
            .await?;
        payload::parse_vanity(body)
    }
}

#[async_trait]
impl LibraryService for SteamClient {
    async fn owned_games(&self, user_id: &UserId) -> Result<LibraryResponse> {
        let url = format!("{}/IPlayerService/GetOwnedGames/v1/", self.api_base);
        debug!(steamid = %user_id, "fetching owned games");
        let body = self
            .get_json(
                &url,
                &[
                    ("key", self.api_key()?),
                    ("steamid", user_id.as_str()),
                    ("include_appinfo", "true"),
                    ("include_played_free_games", "true"),
                    ("format", "json"),
                ],
            )
            .await?;
        payload::parse_owned_games(body)
    }
}

#[async_trait]
impl CatalogService for SteamClient {
    async fn details(&self, ids: &[AppId]) -> Result<HashMap<AppId, CatalogEntry>> {
        let url = format!("{}/appdetails", self.store_base);
        let appids = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        debug!(appids = %appids, "fetching app details");
        let body = self.get_json(&url, &[("appids", appids.as_str())]).await?;
        payload::parse_app_details(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_is_treated_as_missing() -> Result<()> {
        let client = SteamClient::new(Some("  ".to_string()), Duration::from_secs(5))?;
        assert!(client.api_key().is_err());

        let client = SteamClient::new(Some("KEY".to_string()), Duration::from_secs(5))?;
        assert_eq!(client.api_key()?, "KEY");
        Ok(())
    }

    #[tokio::test]
    async fn identity_calls_fail_without_key() -> Result<()> {
        let client = SteamClient::new(None, Duration::from_secs(5))?
            .with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
        let err = client.resolve("someone").await.unwrap_err();
        assert!(err.to_string().contains("API key"));
        Ok(())
    }
}

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    models::{AppId, Descriptor, Game, GameDetails, UserId},
    services::{CatalogEntry, LibraryResponse},
};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct VanityResponse {
    success: i64,
    steamid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OwnedGamesResponse {
    games: Option<Vec<OwnedGame>>,
}

#[derive(Debug, Deserialize)]
struct OwnedGame {
    appid: AppId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    playtime_forever: u32,
    #[serde(default)]
    img_icon_url: Option<String>,
}

impl From<OwnedGame> for Game {
    fn from(raw: OwnedGame) -> Self {
        Game {
            appid: raw.appid,
            name: raw.name.unwrap_or_else(|| format!("App {}", raw.appid)),
            playtime_minutes: raw.playtime_forever,
            icon_ref: raw.img_icon_url.filter(|icon| !icon.is_empty()),
            details: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppDetailsEntry {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<StoreData>,
}

#[derive(Debug, Deserialize)]
struct StoreData {
    #[serde(default)]
    genres: Vec<Descriptor>,
    #[serde(default)]
    categories: Vec<Descriptor>,
    #[serde(default)]
    metacritic: Option<Metacritic>,
    #[serde(default)]
    short_description: Option<String>,
    #[serde(default)]
    header_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Metacritic {
    score: u8,
}

impl From<StoreData> for GameDetails {
    fn from(data: StoreData) -> Self {
        GameDetails {
            genres: data.genres,
            categories: data.categories,
            metacritic_score: data.metacritic.map(|m| m.score),
            short_description: data.short_description.filter(|s| !s.is_empty()),
            header_image_url: data.header_image.filter(|s| !s.is_empty()),
        }
    }
}

/// Decode a `ResolveVanityURL` response.
pub fn parse_vanity(body: Value) -> Result<Option<UserId>> {
    let envelope: Envelope<VanityResponse> =
        serde_json::from_value(body).context("malformed vanity response")?;
    if envelope.response.success != 1 {
        return Ok(None);
    }
    envelope
        .response
        .steamid
        .map(UserId)
        .map(Some)
        .ok_or_else(|| anyhow!("vanity response reported success without a steamid"))
}

/// Decode a `GetOwnedGames` response.
pub fn parse_owned_games(body: Value) -> Result<LibraryResponse> {
    let envelope: Envelope<OwnedGamesResponse> =
        serde_json::from_value(body).context("malformed owned games response")?;
    match envelope.response.games {
        Some(games) if !games.is_empty() => Ok(LibraryResponse::Games(
            games.into_iter().map(Game::from).collect(),
        )),
        _ => Ok(LibraryResponse::PrivateOrEmpty),
    }
}

/// Decode an `appdetails` response keyed by stringified app id.
///
/// The body must be a JSON object. Entries whose `data` cannot be decoded are
/// reported as unsuccessful rather than failing the whole batch.
pub fn parse_app_details(body: Value) -> Result<HashMap<AppId, CatalogEntry>> {
    let Value::Object(entries) = body else {
        return Err(anyhow!("appdetails payload is not an object"));
    };

    let mut result = HashMap::with_capacity(entries.len());
    for (key, raw) in entries {
        let Ok(appid) = key.parse::<AppId>() else {
            warn!("ignoring appdetails entry with non-numeric key {key:?}");
            continue;
        };

        let entry = match serde_json::from_value::<AppDetailsEntry>(raw) {
            Ok(AppDetailsEntry {
                success: true,
                data: Some(data),
            }) => CatalogEntry::Details(data.into()),
            Ok(_) => CatalogEntry::Unsuccessful,
            Err(err) => {
                warn!(appid, "undecodable appdetails entry: {err}");
                CatalogEntry::Unsuccessful
            }
        };
        result.insert(appid, entry);
    }
    Ok(result)
}

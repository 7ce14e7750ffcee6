//! Shared domain models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable storefront identifier of a title.
pub type AppId = u32;

/// Base URL for community-hosted library icons.
const ICON_BASE_URL: &str = "https://media.steampowered.com/steamcommunity/public/images/apps";

/// Stable numeric account identifier obtained from a vanity name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single `{ description }` entry of a genre or category list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Human-readable label, e.g. `Action` or `Multi-player`.
    pub description: String,
}

impl Descriptor {
    /// Build a descriptor from any string-like label.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Case-insensitive substring match against the description.
    pub fn mentions(&self, needle: &str) -> bool {
        self.description
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }
}

/// Catalog metadata attached to a game by enrichment.
///
/// A game either carries a complete snapshot or none at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDetails {
    /// Ordered genre list as returned by the catalog.
    #[serde(default)]
    pub genres: Vec<Descriptor>,
    /// Ordered store category list (e.g. `Single-player`).
    #[serde(default)]
    pub categories: Vec<Descriptor>,
    /// Metacritic score between 0 and 100, when rated.
    #[serde(default)]
    pub metacritic_score: Option<u8>,
    /// Store blurb.
    #[serde(default)]
    pub short_description: Option<String>,
    /// Storefront header artwork.
    #[serde(default)]
    pub header_image_url: Option<String>,
}

/// Owned title from a user's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Stable identity of the game.
    pub appid: AppId,
    /// Display name.
    pub name: String,
    /// Total recorded playtime in minutes.
    pub playtime_minutes: u32,
    /// Hash of the community icon, if the library reported one.
    #[serde(default)]
    pub icon_ref: Option<String>,
    /// Catalog details, present only after successful enrichment.
    #[serde(default)]
    pub details: Option<GameDetails>,
}

impl Game {
    /// Build a bare library entry without icon or details.
    pub fn new(appid: AppId, name: impl Into<String>, playtime_minutes: u32) -> Self {
        Self {
            appid,
            name: name.into(),
            playtime_minutes,
            icon_ref: None,
            details: None,
        }
    }

    /// Whether enrichment has attached details to this game.
    pub fn is_enriched(&self) -> bool {
        self.details.is_some()
    }

    /// Returns a copy of this game carrying the given details.
    pub fn with_details(&self, details: GameDetails) -> Self {
        Self {
            details: Some(details),
            ..self.clone()
        }
    }

    /// Community icon URL derived from `icon_ref`.
    pub fn icon_url(&self) -> Option<String> {
        self.icon_ref
            .as_deref()
            .filter(|icon| !icon.is_empty())
            .map(|icon| format!("{ICON_BASE_URL}/{}/{icon}.jpg", self.appid))
    }

    /// Playtime rendered in hours with one decimal, e.g. `0.5h`.
    pub fn playtime_label(&self) -> String {
        format!("{:.1}h", f64::from(self.playtime_minutes) / 60.0)
    }
}

/// Cached view of one user's library at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedSnapshot {
    /// Username as typed by the user. Compared case-insensitively.
    pub username: String,
    /// Games captured for this user.
    pub games: Vec<Game>,
    /// When the snapshot was written.
    pub captured_at: DateTime<Utc>,
}

impl EnrichedSnapshot {
    /// Capture the given games for `username` at the current time.
    pub fn capture(username: impl Into<String>, games: Vec<Game>) -> Self {
        Self {
            username: username.into(),
            games,
            captured_at: Utc::now(),
        }
    }

    /// Whether this snapshot belongs to `username`, ignoring case.
    pub fn belongs_to(&self, username: &str) -> bool {
        self.username.trim().to_lowercase() == username.trim().to_lowercase()
    }
}

/// Read-only projection of a selected game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Game name.
    pub title: String,
    /// Storefront id of the selected game.
    pub appid: AppId,
    /// Genre descriptions, flattened.
    pub genres: Vec<String>,
    /// Metacritic score, if rated.
    pub score: Option<u8>,
    /// Header artwork URL, empty when the catalog had none.
    pub icon_url: String,
    /// Recorded playtime in minutes.
    pub playtime_minutes: u32,
    /// Store blurb, empty when the catalog had none.
    pub description: String,
}

impl From<&Game> for Recommendation {
    fn from(game: &Game) -> Self {
        let details = game.details.as_ref();
        Self {
            title: game.name.clone(),
            appid: game.appid,
            genres: details
                .map(|d| d.genres.iter().map(|g| g.description.clone()).collect())
                .unwrap_or_default(),
            score: details.and_then(|d| d.metacritic_score),
            icon_url: details
                .and_then(|d| d.header_image_url.clone())
                .unwrap_or_default(),
            playtime_minutes: game.playtime_minutes,
            description: details
                .and_then(|d| d.short_description.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_url_requires_icon_ref() {
        let mut game = Game::new(440, "Team Fortress 2", 12);
        assert_eq!(game.icon_url(), None);

        game.icon_ref = Some("e3f595a92552da3d664ad00277fad2107345f743".to_string());
        assert_eq!(
            game.icon_url().as_deref(),
            Some("https://media.steampowered.com/steamcommunity/public/images/apps/440/e3f595a92552da3d664ad00277fad2107345f743.jpg")
        );
    }

    #[test]
    fn recommendation_defaults_missing_fields() {
        let game = Game::new(10, "Counter-Strike", 30).with_details(GameDetails {
            genres: vec![Descriptor::new("Action")],
            ..GameDetails::default()
        });

        let rec = Recommendation::from(&game);
        assert_eq!(rec.title, "Counter-Strike");
        assert_eq!(rec.genres, vec!["Action".to_string()]);
        assert_eq!(rec.score, None);
        assert!(rec.icon_url.is_empty());
        assert!(rec.description.is_empty());
        assert_eq!(rec.playtime_minutes, 30);
    }

    #[test]
    fn snapshot_ownership_ignores_case() {
        let snapshot = EnrichedSnapshot::capture("Alice", Vec::new());
        assert!(snapshot.belongs_to("alice"));
        assert!(snapshot.belongs_to("ALICE"));
        assert!(!snapshot.belongs_to("bob"));
    }

    #[test]
    fn playtime_label_uses_hours() {
        assert_eq!(Game::new(1, "Short", 30).playtime_label(), "0.5h");
    }
}

//! Recommendation filters and selection.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::{AnalysisError, Result},
    models::{Game, Recommendation},
};

/// Playtime threshold, in minutes, below which a game is a candidate.
pub const LOW_PLAYTIME_MINUTES: u32 = 60;

/// Closed set of recommendation filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Any candidate.
    Random,
    /// Role-playing games.
    Rpg,
    /// Action and shooter games.
    Fps,
    /// Games with a multi-player category.
    Multiplayer,
    /// Highest Metacritic score.
    Top,
}

impl Filter {
    /// Every filter, in display order.
    pub const ALL: [Filter; 5] = [
        Filter::Random,
        Filter::Rpg,
        Filter::Fps,
        Filter::Multiplayer,
        Filter::Top,
    ];

    /// Lowercase identifier, e.g. `multiplayer`.
    pub fn as_str(self) -> &'static str {
        match self {
            Filter::Random => "random",
            Filter::Rpg => "rpg",
            Filter::Fps => "fps",
            Filter::Multiplayer => "multiplayer",
            Filter::Top => "top",
        }
    }

    /// Button-style label for display.
    pub fn label(self) -> &'static str {
        match self {
            Filter::Random => "Surprise me",
            Filter::Rpg => "RPG",
            Filter::Fps => "FPS",
            Filter::Multiplayer => "Multiplayer",
            Filter::Top => "Top rated",
        }
    }

    fn matches(self, game: &Game) -> bool {
        let Some(details) = game.details.as_ref() else {
            return false;
        };
        match self {
            Filter::Random => true,
            Filter::Rpg => details.genres.iter().any(|g| g.mentions("rpg")),
            Filter::Fps => {
                details
                    .genres
                    .iter()
                    .any(|g| g.mentions("action") || g.mentions("shooter"))
                    || details.categories.iter().any(|c| c.mentions("fps"))
            }
            Filter::Multiplayer => details
                .categories
                .iter()
                .any(|c| c.mentions("multi-player") || c.mentions("multiplayer")),
            Filter::Top => details.metacritic_score.is_some(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown filter name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown filter {0:?}, expected one of random, rpg, fps, multiplayer, top")]
pub struct UnknownFilter(pub String);

impl FromStr for Filter {
    type Err = UnknownFilter;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let needle = value.trim().to_lowercase();
        Filter::ALL
            .into_iter()
            .find(|filter| filter.as_str() == needle)
            .ok_or_else(|| UnknownFilter(value.to_string()))
    }
}

/// Applies filters over an enriched collection and picks one game.
#[derive(Debug, Clone, Copy)]
pub struct FilterEngine {
    low_playtime_minutes: u32,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(LOW_PLAYTIME_MINUTES)
    }
}

impl FilterEngine {
    /// Engine treating games under `low_playtime_minutes` as candidates.
    pub fn new(low_playtime_minutes: u32) -> Self {
        Self {
            low_playtime_minutes,
        }
    }

    /// Candidates for `filter`, in selection order.
    ///
    /// Only enriched games under the playtime threshold are considered. For
    /// [`Filter::Top`] the result is sorted by descending score with ties kept
    /// in their original order.
    pub fn eligible<'a>(&self, games: &'a [Game], filter: Filter) -> Vec<&'a Game> {
        let mut eligible: Vec<&Game> = games
            .iter()
            .filter(|game| game.playtime_minutes < self.low_playtime_minutes)
            .filter(|game| filter.matches(game))
            .collect();

        if filter == Filter::Top {
            eligible.sort_by(|a, b| score(b).cmp(&score(a)));
        }
        eligible
    }

    /// Pick a game for `filter`.
    ///
    /// `Top` always takes the highest score. Every other filter picks uniformly
    /// from its candidates using `rng`.
    pub fn select<'a, R>(&self, games: &'a [Game], filter: Filter, rng: &mut R) -> Result<&'a Game>
    where
        R: Rng,
    {
        let eligible = self.eligible(games, filter);
        if eligible.is_empty() {
            return Err(AnalysisError::NoMatch(filter));
        }

        let index = match filter {
            Filter::Top => 0,
            _ => rng.gen_range(0..eligible.len()),
        };
        Ok(eligible[index])
    }

    /// Select a game and project it into a [`Recommendation`].
    pub fn recommend<R>(&self, games: &[Game], filter: Filter, rng: &mut R) -> Result<Recommendation>
    where
        R: Rng,
    {
        self.select(games, filter, rng).map(Recommendation::from)
    }
}

fn score(game: &Game) -> Option<u8> {
    game.details.as_ref().and_then(|d| d.metacritic_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Descriptor, GameDetails};
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    fn game(appid: u32, genres: &[&str], categories: &[&str], score: Option<u8>) -> Game {
        Game::new(appid, format!("Game {appid}"), 10).with_details(GameDetails {
            genres: genres.iter().map(|g| Descriptor::new(*g)).collect(),
            categories: categories.iter().map(|c| Descriptor::new(*c)).collect(),
            metacritic_score: score,
            short_description: Some(format!("About {appid}")),
            header_image_url: Some(format!("https://example.com/{appid}.jpg")),
        })
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn top_picks_highest_score_and_ignores_unscored() {
        let games = vec![
            game(1, &[], &[], Some(80)),
            game(2, &[], &[], Some(95)),
            game(3, &[], &[], None),
            game(4, &[], &[], Some(60)),
        ];
        let engine = FilterEngine::default();

        let selected = engine.select(&games, Filter::Top, &mut rng()).expect("match");
        assert_eq!(selected.appid, 2);

        let order: Vec<_> = engine
            .eligible(&games, Filter::Top)
            .iter()
            .map(|g| g.appid)
            .collect();
        assert_eq!(order, vec![2, 1, 4]);
    }

    #[test]
    fn top_ties_keep_original_order() {
        let games = vec![
            game(1, &[], &[], Some(70)),
            game(2, &[], &[], Some(90)),
            game(3, &[], &[], Some(90)),
        ];
        let selected = FilterEngine::default()
            .select(&games, Filter::Top, &mut rng())
            .expect("match");
        assert_eq!(selected.appid, 2);
    }

    #[test]
    fn rpg_requires_literal_substring() {
        let games = vec![
            game(1, &["Action"], &[], None),
            game(2, &["RPG"], &[], None),
            game(3, &["Role-Playing Game"], &[], None),
        ];
        let engine = FilterEngine::default();

        let eligible: Vec<_> = engine
            .eligible(&games, Filter::Rpg)
            .iter()
            .map(|g| g.appid)
            .collect();
        assert_eq!(eligible, vec![2]);

        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selected = engine.select(&games, Filter::Rpg, &mut rng).expect("match");
            assert_eq!(selected.appid, 2);
        }
    }

    #[test]
    fn fps_matches_genres_or_categories() {
        let games = vec![
            game(1, &["Action"], &[], None),
            game(2, &["Shooter"], &[], None),
            game(3, &["Strategy"], &["Tactical FPS"], None),
            game(4, &["Puzzle"], &["Single-player"], None),
        ];
        let eligible: Vec<_> = FilterEngine::default()
            .eligible(&games, Filter::Fps)
            .iter()
            .map(|g| g.appid)
            .collect();
        assert_eq!(eligible, vec![1, 2, 3]);
    }

    #[test]
    fn multiplayer_matches_both_spellings() {
        let games = vec![
            game(1, &[], &["Multi-player"], None),
            game(2, &[], &["Online Multiplayer"], None),
            game(3, &[], &["Single-player"], None),
        ];
        let eligible: Vec<_> = FilterEngine::default()
            .eligible(&games, Filter::Multiplayer)
            .iter()
            .map(|g| g.appid)
            .collect();
        assert_eq!(eligible, vec![1, 2]);
    }

    #[test]
    fn unenriched_or_long_played_games_never_match() {
        let mut played = game(2, &["RPG"], &[], Some(90));
        played.playtime_minutes = 60;
        let games = vec![Game::new(1, "Bare", 5), played];
        let engine = FilterEngine::default();

        for filter in Filter::ALL {
            let err = engine.select(&games, filter, &mut rng()).unwrap_err();
            assert!(matches!(err, AnalysisError::NoMatch(f) if f == filter));
        }
    }

    #[test]
    fn random_selection_is_seedable_and_covers_candidates() {
        let games: Vec<_> = (1..=4).map(|id| game(id, &["Indie"], &[], None)).collect();
        let engine = FilterEngine::default();

        let first = engine.select(&games, Filter::Random, &mut rng()).expect("match");
        let again = engine.select(&games, Filter::Random, &mut rng()).expect("match");
        assert_eq!(first.appid, again.appid);

        let mut rng = rng();
        let picked: HashSet<_> = (0..200)
            .map(|_| {
                engine
                    .select(&games, Filter::Random, &mut rng)
                    .expect("match")
                    .appid
            })
            .collect();
        assert_eq!(picked.len(), 4);
    }

    #[test]
    fn custom_threshold_is_respected() {
        let mut game = game(1, &["RPG"], &[], None);
        game.playtime_minutes = 90;
        let games = vec![game];

        assert!(FilterEngine::default()
            .select(&games, Filter::Rpg, &mut rng())
            .is_err());
        assert!(FilterEngine::new(120)
            .select(&games, Filter::Rpg, &mut rng())
            .is_ok());
    }

    #[test]
    fn recommendation_projects_details() {
        let games = vec![game(9, &["RPG", "Indie"], &[], Some(77))];
        let rec = FilterEngine::default()
            .recommend(&games, Filter::Rpg, &mut rng())
            .expect("match");
        assert_eq!(rec.appid, 9);
        assert_eq!(rec.genres, vec!["RPG".to_string(), "Indie".to_string()]);
        assert_eq!(rec.score, Some(77));
        assert_eq!(rec.icon_url, "https://example.com/9.jpg");
        assert_eq!(rec.description, "About 9");
    }

    #[test]
    fn filters_parse_from_names() {
        assert_eq!("RPG".parse::<Filter>(), Ok(Filter::Rpg));
        assert_eq!(" top ".parse::<Filter>(), Ok(Filter::Top));
        assert!("strategy".parse::<Filter>().is_err());
        for filter in Filter::ALL {
            assert_eq!(filter.to_string().parse::<Filter>(), Ok(filter));
        }
    }
}

use anyhow::{bail, Result};
use std::fs::{self, OpenOptions};

use clap::{Parser, Subcommand, ValueEnum};
use gamepicker_core::{
    config::{self, AppConfig},
    AnalysisEvent, FileSessionCache, Filter, Game, Orchestrator, Recommendation, SteamClient,
    Strategy,
};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "gamepicker", about = "Pick an unplayed game from a Steam library")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a library and enrich its low-playtime games.
    Analyze {
        /// Steam vanity name.
        username: String,
        /// Wait for every batch instead of streaming results.
        #[arg(long)]
        all_at_once: bool,
        /// Batch strategy used with --all-at-once.
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },
    /// Recommend a game from the last analysis.
    Recommend {
        /// Steam vanity name.
        username: String,
        /// One of random, rpg, fps, multiplayer, top.
        #[arg(long, short, default_value = "random")]
        filter: Filter,
        /// Seed for reproducible picks.
        #[arg(long)]
        seed: Option<u64>,
        /// Print the recommendation as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Forget cached analyses.
    Clear {
        /// Steam vanity name to forget.
        username: Option<String>,
        /// Forget every user.
        #[arg(long, conflicts_with = "username")]
        all: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Sequential,
    Parallel,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sequential => Strategy::Sequential,
            StrategyArg::Parallel => Strategy::ParallelStaggered,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let config_path = config::ensure_default_config()?;
    let config = AppConfig::load()?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let client = SteamClient::new(config.steam_api_key.clone(), config.request_timeout())?;
    let cache = Arc::new(FileSessionCache::new(config.cache_root.clone()));
    let orchestrator = Orchestrator::with_steam(client, cache, &config);

    match cli.command {
        Command::Analyze {
            username,
            all_at_once,
            strategy,
        } => {
            if all_at_once {
                let strategy = strategy
                    .map(Strategy::from)
                    .unwrap_or(config.enrichment.strategy);
                let games = orchestrator.analyze(&username, strategy).await?;
                print_games(&games);
            } else {
                analyze_progressively(&orchestrator, &username).await?;
            }
        }
        Command::Recommend {
            username,
            filter,
            seed,
            json,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let recommendation = orchestrator.recommend(&username, filter, &mut rng)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&recommendation)?);
            } else {
                print_recommendation(filter, &recommendation);
            }
        }
        Command::Clear { username, all } => match (username, all) {
            (_, true) => orchestrator.clear_all()?,
            (Some(username), false) => orchestrator.clear(&username)?,
            (None, false) => bail!("pass a username or --all"),
        },
    }

    Ok(())
}

async fn analyze_progressively(orchestrator: &Orchestrator, username: &str) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = orchestrator.analyze_progressively(username, Some(tx)).await?;
    let games = handle.games();
    println!(
        "Found {} games with less than 1 hour of playtime, fetching details...",
        games.len()
    );

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(AnalysisEvent::GameEnriched(game)) => println!("  {}", describe(&game)),
                Some(AnalysisEvent::Finished(_)) | None => break,
                Some(AnalysisEvent::StateChanged(_)) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping after the current game...");
                handle.cancel();
            }
        }
    }

    let summary = handle.wait().await?;
    println!(
        "Enriched {}/{} games ({} unavailable, {} failed{}).",
        summary.enriched,
        summary.total,
        summary.unavailable.len(),
        summary.failed.len(),
        if summary.cancelled { ", cancelled" } else { "" }
    );
    Ok(())
}

fn describe(game: &Game) -> String {
    let genres = game
        .details
        .as_ref()
        .map(|d| {
            d.genres
                .iter()
                .take(3)
                .map(|g| g.description.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    let score = game
        .details
        .as_ref()
        .and_then(|d| d.metacritic_score)
        .map(|s| format!(" [{s}]"))
        .unwrap_or_default();
    format!("{} ({}) {genres}{score}", game.name, game.playtime_label())
}

fn print_games(games: &[Game]) {
    println!(
        "Found {} games with less than 1 hour of playtime:",
        games.len()
    );
    for game in games {
        println!("  {}", describe(game));
    }
}

fn print_recommendation(filter: Filter, rec: &Recommendation) {
    println!("{}: {} (app {})", filter.label(), rec.title, rec.appid);
    if !rec.genres.is_empty() {
        println!("  Genres: {}", rec.genres.join(", "));
    }
    if let Some(score) = rec.score {
        println!("  Metacritic: {score}");
    }
    println!("  Playtime: {} min", rec.playtime_minutes);
    if !rec.description.is_empty() {
        println!("  {}", rec.description);
    }
    println!("  https://store.steampowered.com/app/{}/", rec.appid);
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("gamepicker.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(std::sync::Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

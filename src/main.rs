//! # matchday CLI
//!
//! Interactive Q&A over yesterday's football results.
//!
//! ## Usage
//!
//! ```bash
//! matchday [--config ./config/matchday.toml] [--refresh] [--location <LOC>] [--test]
//! ```
//!
//! On startup the shell checks how fresh the cached match data is and
//! refreshes it from the provider when it is older than 12 hours, then
//! reads commands and free-text questions until `exit` or Ctrl-C.
//!
//! Credentials come from the environment: `FOOTBALL_API_KEY` for the
//! sports-data provider and `OPENAI_API_KEY` for the answer backend. A
//! missing key only surfaces when the corresponding feature is used.

mod config;
mod engine;
mod errors;
mod fetcher;
mod models;
mod shell;
mod store;

use clap::Parser;
use std::path::PathBuf;

use crate::config::Credentials;
use crate::engine::{OpenAiClient, QnaEngine};
use crate::fetcher::{ApiFootballClient, FixtureSource, MatchSource};
use crate::shell::Shell;
use crate::store::{MatchStore, MemoryStore, SqliteStore};

/// matchday — ask anything about yesterday's football matches.
#[derive(Parser)]
#[command(
    name = "matchday",
    about = "A terminal Q&A assistant for yesterday's football results",
    version,
    long_about = "matchday caches the previous UTC day's fixtures from a sports-data API in a \
    local SQLite database and answers free-text questions about them through a language-model \
    backend. Run it with --test for a fully offline session backed by embedded sample data."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Built-in defaults are used when the file does not exist.
    #[arg(long, default_value = "./config/matchday.toml")]
    config: PathBuf,

    /// Force a data refresh at startup, regardless of cache freshness.
    #[arg(long)]
    refresh: bool,

    /// Scope fetched matches to a region (e.g. "England", "Spain").
    #[arg(long)]
    location: Option<String>,

    /// Use embedded test data and an in-memory store instead of the live
    /// API and SQLite. No network calls are made for match data.
    #[arg(long)]
    test: bool,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::load_config(&cli.config)?;
    let credentials = Credentials::from_env();

    let (source, store): (Box<dyn MatchSource>, Box<dyn MatchStore>) = if cli.test {
        (Box::new(FixtureSource), Box::new(MemoryStore::new()))
    } else {
        let store = SqliteStore::open(&config.db).await?;
        let client = ApiFootballClient::new(&config.api, credentials.football_api_key.clone());
        (Box::new(client), Box::new(store))
    };

    let engine = QnaEngine::new(Box::new(OpenAiClient::new(
        &config.model,
        credentials.openai_api_key.clone(),
    )));

    let mut shell = Shell::new(source, store, engine, cli.location, cli.test);
    shell.run(cli.refresh).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Nothing past this point exits non-zero: faults are reported and the
    // session still ends with a farewell.
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
    }

    println!("Thanks for using matchday. Goodbye!");
}

//! Storage abstraction for cached match data.
//!
//! The [`MatchStore`] trait defines every query the shell needs, enabling
//! pluggable backends: [`SqliteStore`] for normal runs and [`MemoryStore`]
//! for `--test` and unit tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::Result;
use crate::models::{LeagueCount, MatchRecord, TeamEntry};

/// Abstract storage backend for match records, keyed by calendar date.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_matches`](MatchStore::save_matches) | Replace a date's match set and bump the refresh timestamp |
/// | [`matches_on`](MatchStore::matches_on) | All matches stored for a date |
/// | [`leagues_on`](MatchStore::leagues_on) | Leagues with match counts for a date |
/// | [`teams_on`](MatchStore::teams_on) | Distinct (team, league) pairs for a date |
/// | [`last_update`](MatchStore::last_update) | Timestamp of the most recent successful save |
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Replace the stored match set for `date` with `records` and record the
    /// refresh time.
    ///
    /// Replace semantics: the date's previous rows are gone after this call,
    /// and a reader never observes a partially written set.
    async fn save_matches(&self, date: NaiveDate, records: &[MatchRecord]) -> Result<()>;

    /// All matches stored for `date`, ordered by league then fixture id.
    /// Empty vec when nothing is stored — never an error.
    async fn matches_on(&self, date: NaiveDate) -> Result<Vec<MatchRecord>>;

    /// Leagues represented on `date` with per-league match counts, ordered
    /// by league name.
    async fn leagues_on(&self, date: NaiveDate) -> Result<Vec<LeagueCount>>;

    /// Every distinct (team, league) pair appearing home or away on `date`,
    /// ordered by team name.
    async fn teams_on(&self, date: NaiveDate) -> Result<Vec<TeamEntry>>;

    /// When match data was last successfully saved; `None` before the very
    /// first save.
    async fn last_update(&self) -> Result<Option<DateTime<Utc>>>;
}

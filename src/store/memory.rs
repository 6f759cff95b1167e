//! In-memory [`MatchStore`] implementation for `--test` runs and unit
//! tests.
//!
//! Uses a `HashMap` keyed by date behind `std::sync::RwLock`. Aggregations
//! are computed on read with ordered collections, matching the SQLite
//! backend's ordering.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::Result;
use crate::models::{LeagueCount, MatchRecord, TeamEntry};

use super::MatchStore;

/// In-memory store; state lives for the session only.
pub struct MemoryStore {
    matches: RwLock<HashMap<NaiveDate, Vec<MatchRecord>>>,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            last_update: RwLock::new(None),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn save_matches(&self, date: NaiveDate, records: &[MatchRecord]) -> Result<()> {
        {
            let mut stored = self.matches.write().unwrap();
            stored.insert(date, records.to_vec());
        }
        *self.last_update.write().unwrap() = Some(Utc::now());
        Ok(())
    }

    async fn matches_on(&self, date: NaiveDate) -> Result<Vec<MatchRecord>> {
        let stored = self.matches.read().unwrap();
        let mut records = stored.get(&date).cloned().unwrap_or_default();
        records.sort_by(|a, b| a.league.cmp(&b.league).then(a.fixture_id.cmp(&b.fixture_id)));
        Ok(records)
    }

    async fn leagues_on(&self, date: NaiveDate) -> Result<Vec<LeagueCount>> {
        let stored = self.matches.read().unwrap();
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for record in stored.get(&date).map(|v| v.as_slice()).unwrap_or(&[]) {
            *counts.entry(record.league.clone()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(name, match_count)| LeagueCount { name, match_count })
            .collect())
    }

    async fn teams_on(&self, date: NaiveDate) -> Result<Vec<TeamEntry>> {
        let stored = self.matches.read().unwrap();
        let mut pairs: BTreeSet<(String, String)> = BTreeSet::new();
        for record in stored.get(&date).map(|v| v.as_slice()).unwrap_or(&[]) {
            pairs.insert((record.home_team.clone(), record.league.clone()));
            pairs.insert((record.away_team.clone(), record.league.clone()));
        }
        Ok(pairs
            .into_iter()
            .map(|(name, league)| TeamEntry { name, league })
            .collect())
    }

    async fn last_update(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(*self.last_update.read().unwrap())
    }
}

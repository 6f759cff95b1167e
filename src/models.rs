//! Core data models used throughout matchday.
//!
//! These types represent the match records that flow from the fetcher into
//! the store and out to the answer engine, plus the aggregate shapes the
//! store exposes for the `leagues` and `teams` commands.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single fixture, normalized from the provider's nested payload.
///
/// `fixture_id` is the provider-assigned identifier and is unique per
/// record. Scores are absent while a match is not finished.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub league: String,
    pub fixture_id: i64,
    pub goals: Vec<GoalEvent>,
}

impl MatchRecord {
    /// Score display for tables and prompt context, e.g. `2 - 1`, or `? - ?`
    /// for an unfinished match.
    pub fn score_line(&self) -> String {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) => format!("{} - {}", h, a),
            _ => "? - ?".to_string(),
        }
    }
}

/// A goal event within a match, in scoring order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalEvent {
    pub minute: Option<u32>,
    pub team: String,
    pub player: String,
}

/// Aggregate row for the `leagues` command: one league and how many of the
/// date's matches it contains.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueCount {
    pub name: String,
    pub match_count: i64,
}

/// A distinct (team, league) pair appearing in a date's matches.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamEntry {
    pub name: String,
    pub league: String,
}

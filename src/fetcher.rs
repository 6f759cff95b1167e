//! Match data sources and provider payload normalization.
//!
//! Defines the [`MatchSource`] trait and two implementations:
//! - **[`ApiFootballClient`]** — calls the live API-Football `fixtures`
//!   endpoint with retry and backoff.
//! - **[`FixtureSource`]** — parses an embedded provider-shaped payload,
//!   for offline runs (`--test`) and development without credentials.
//!
//! Both go through [`normalize_fixture`], so provider quirks (nested
//! `fixture`/`teams`/`goals`/`league` sub-objects) never leak past this
//! module. An entry missing a required field is dropped, never stored
//! half-formed.
//!
//! # Retry Strategy
//!
//! The live client retries transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, ... (capped at 2^5)

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::errors::{AppError, Result};
use crate::models::{GoalEvent, MatchRecord};

/// A source of normalized match records for one calendar date.
///
/// Implementations may hit the network or return canned data; the shell
/// treats them identically.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Short identifier shown in status output (e.g. `"api-football"`).
    fn name(&self) -> &str;

    /// Fetch all matches played on `date`, optionally scoped to a region.
    ///
    /// An empty vec is a valid result (no matches played). Errors are
    /// [`AppError::UpstreamFetch`] or [`AppError::MissingCredential`].
    async fn fetch(&self, date: NaiveDate, location: Option<&str>) -> Result<Vec<MatchRecord>>;
}

// ============ Live provider ============

/// Live client for the API-Football v3 `fixtures` endpoint.
pub struct ApiFootballClient {
    api_key: Option<String>,
    base_url: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl ApiFootballClient {
    pub fn new(config: &ApiConfig, api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }

    async fn get_fixtures(&self, date: NaiveDate) -> Result<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AppError::MissingCredential("FOOTBALL_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| AppError::upstream(e.to_string()))?;

        let url = format!(
            "{}/fixtures?date={}",
            self.base_url,
            date.format("%Y-%m-%d")
        );

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .get(&url)
                .header("x-apisports-key", api_key)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response
                            .json()
                            .await
                            .map_err(|e| AppError::upstream(format!("invalid payload: {}", e)))?;

                        // API-Football reports auth/quota problems inside a
                        // 200 body rather than via status codes.
                        if let Some(errors) = json.get("errors") {
                            let has_errors = match errors {
                                Value::Object(m) => !m.is_empty(),
                                Value::Array(a) => !a.is_empty(),
                                _ => false,
                            };
                            if has_errors {
                                return Err(AppError::upstream(errors.to_string()));
                            }
                        }

                        return Ok(json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        last_err = Some(AppError::upstream(format!("HTTP {}: {}", status, body)));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::upstream(format!("HTTP {}: {}", status, body)));
                }
                Err(e) => {
                    last_err = Some(AppError::upstream(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AppError::upstream("fetch failed after retries")))
    }
}

#[async_trait]
impl MatchSource for ApiFootballClient {
    fn name(&self) -> &str {
        "api-football"
    }

    async fn fetch(&self, date: NaiveDate, location: Option<&str>) -> Result<Vec<MatchRecord>> {
        let json = self.get_fixtures(date).await?;
        Ok(normalize_response(&json, date, location))
    }
}

// ============ Offline provider ============

/// Offline source backed by an embedded provider-shaped payload.
///
/// Selected with `--test`. The payload runs through the same normalization
/// as a live response, and each record is stamped with the requested date
/// so the session's target-date queries find it.
pub struct FixtureSource;

const OFFLINE_FIXTURES: &str = include_str!("offline_fixtures.json");

#[async_trait]
impl MatchSource for FixtureSource {
    fn name(&self) -> &str {
        "offline"
    }

    async fn fetch(&self, date: NaiveDate, location: Option<&str>) -> Result<Vec<MatchRecord>> {
        let json: Value = serde_json::from_str(OFFLINE_FIXTURES)
            .map_err(|e| AppError::upstream(format!("invalid embedded fixtures: {}", e)))?;
        Ok(normalize_response(&json, date, location))
    }
}

// ============ Normalization ============

/// Flatten every entry of a provider response into [`MatchRecord`]s,
/// dropping entries that fail [`normalize_fixture`] and entries outside the
/// optional location scope.
fn normalize_response(json: &Value, date: NaiveDate, location: Option<&str>) -> Vec<MatchRecord> {
    let entries = json
        .get("response")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    entries
        .iter()
        .filter(|entry| matches_location(entry, location))
        .filter_map(|entry| normalize_fixture(entry, date))
        .collect()
}

/// Region scoping: keep an entry when no hint is given, or when the hint
/// appears in the league's country or name (case-insensitive).
fn matches_location(entry: &Value, location: Option<&str>) -> bool {
    let Some(loc) = location else { return true };
    let needle = loc.to_lowercase();

    let league = entry.get("league");
    let country = league
        .and_then(|l| l.get("country"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let name = league
        .and_then(|l| l.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    country.to_lowercase().contains(&needle) || name.to_lowercase().contains(&needle)
}

/// Map one provider entry to a flat [`MatchRecord`].
///
/// Required: fixture id, both team names, league name. Returns `None` when
/// any is missing so a malformed entry is skipped rather than stored
/// half-formed. Scores stay `None` for unfinished matches; goal events are
/// taken from the optional `events` array in payload order.
pub fn normalize_fixture(entry: &Value, date: NaiveDate) -> Option<MatchRecord> {
    let fixture_id = entry.pointer("/fixture/id")?.as_i64()?;
    let home_team = entry.pointer("/teams/home/name")?.as_str()?.to_string();
    let away_team = entry.pointer("/teams/away/name")?.as_str()?.to_string();
    let league = entry.pointer("/league/name")?.as_str()?.to_string();

    let home_score = entry
        .pointer("/goals/home")
        .and_then(|v| v.as_u64())
        .map(|n| n as u32);
    let away_score = entry
        .pointer("/goals/away")
        .and_then(|v| v.as_u64())
        .map(|n| n as u32);

    let goals = entry
        .get("events")
        .and_then(|v| v.as_array())
        .map(|events| {
            events
                .iter()
                .filter(|e| e.get("type").and_then(|t| t.as_str()) == Some("Goal"))
                .filter_map(|e| {
                    Some(GoalEvent {
                        minute: e
                            .pointer("/time/elapsed")
                            .and_then(|v| v.as_u64())
                            .map(|n| n as u32),
                        team: e.pointer("/team/name")?.as_str()?.to_string(),
                        player: e.pointer("/player/name")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(MatchRecord {
        date,
        home_team,
        away_team,
        home_score,
        away_score,
        league,
        fixture_id,
        goals,
    })
}

//! SQLite-backed [`MatchStore`].
//!
//! One row per fixture in `matches`, keyed by the provider's fixture id,
//! indexed by date. A one-row `refresh_state` table holds the last
//! successful save time. Saves replace a whole date inside a transaction so
//! readers never see a torn match set.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::config::DbConfig;
use crate::errors::Result;
use crate::models::{GoalEvent, LeagueCount, MatchRecord, TeamEntry};

use super::MatchStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at the configured path and
    /// run the idempotent schema migrations.
    pub async fn open(config: &DbConfig) -> AnyResult<Self> {
        let db_path = &config.path;

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn run_migrations(pool: &SqlitePool) -> AnyResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            fixture_id INTEGER PRIMARY KEY,
            match_date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER,
            away_score INTEGER,
            league TEXT NOT NULL,
            goals_json TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS refresh_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_update INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn row_to_record(date: NaiveDate, row: &sqlx::sqlite::SqliteRow) -> MatchRecord {
    let goals_json: String = row.get("goals_json");
    // Tolerant read: an unparseable column yields no goal events rather
    // than failing the whole query.
    let goals: Vec<GoalEvent> = serde_json::from_str(&goals_json).unwrap_or_default();

    MatchRecord {
        date,
        home_team: row.get("home_team"),
        away_team: row.get("away_team"),
        home_score: row.get::<Option<i64>, _>("home_score").map(|n| n as u32),
        away_score: row.get::<Option<i64>, _>("away_score").map(|n| n as u32),
        league: row.get("league"),
        fixture_id: row.get("fixture_id"),
        goals,
    }
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn save_matches(&self, date: NaiveDate, records: &[MatchRecord]) -> Result<()> {
        let key = date_key(date);
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM matches WHERE match_date = ?")
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        for record in records {
            let goals_json =
                serde_json::to_string(&record.goals).unwrap_or_else(|_| "[]".to_string());

            sqlx::query(
                r#"
                INSERT OR REPLACE INTO matches
                    (fixture_id, match_date, home_team, away_team, home_score, away_score, league, goals_json)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.fixture_id)
            .bind(&key)
            .bind(&record.home_team)
            .bind(&record.away_team)
            .bind(record.home_score.map(|n| n as i64))
            .bind(record.away_score.map(|n| n as i64))
            .bind(&record.league)
            .bind(goals_json)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_state (id, last_update) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET last_update = excluded.last_update
            "#,
        )
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn matches_on(&self, date: NaiveDate) -> Result<Vec<MatchRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT fixture_id, home_team, away_team, home_score, away_score, league, goals_json
            FROM matches
            WHERE match_date = ?
            ORDER BY league, fixture_id
            "#,
        )
        .bind(date_key(date))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row_to_record(date, row)).collect())
    }

    async fn leagues_on(&self, date: NaiveDate) -> Result<Vec<LeagueCount>> {
        let rows = sqlx::query(
            r#"
            SELECT league, COUNT(*) AS match_count
            FROM matches
            WHERE match_date = ?
            GROUP BY league
            ORDER BY league
            "#,
        )
        .bind(date_key(date))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LeagueCount {
                name: row.get("league"),
                match_count: row.get("match_count"),
            })
            .collect())
    }

    async fn teams_on(&self, date: NaiveDate) -> Result<Vec<TeamEntry>> {
        // UNION dedups identical (name, league) pairs across home and away.
        let key = date_key(date);
        let rows = sqlx::query(
            r#"
            SELECT home_team AS name, league FROM matches WHERE match_date = ?
            UNION
            SELECT away_team AS name, league FROM matches WHERE match_date = ?
            ORDER BY name
            "#,
        )
        .bind(&key)
        .bind(&key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TeamEntry {
                name: row.get("name"),
                league: row.get("league"),
            })
            .collect())
    }

    async fn last_update(&self) -> Result<Option<DateTime<Utc>>> {
        let ts: Option<i64> =
            sqlx::query_scalar("SELECT last_update FROM refresh_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(ts.and_then(|t| DateTime::from_timestamp(t, 0)))
    }
}

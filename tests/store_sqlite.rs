//! SqliteStore behavior against a real database file in a tempdir.

use chrono::NaiveDate;
use tempfile::TempDir;

use matchday::config::DbConfig;
use matchday::models::{GoalEvent, MatchRecord};
use matchday::store::{MatchStore, SqliteStore};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 13).unwrap()
}

fn other_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

fn record(fixture_id: i64, league: &str, home: &str, away: &str) -> MatchRecord {
    MatchRecord {
        date: day(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_score: Some(2),
        away_score: Some(1),
        league: league.to_string(),
        fixture_id,
        goals: Vec::new(),
    }
}

async fn open_store() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let config = DbConfig {
        path: tmp.path().join("data").join("matchday.sqlite"),
    };
    let store = SqliteStore::open(&config).await.unwrap();
    (tmp, store)
}

#[tokio::test]
async fn empty_date_queries_return_empty_not_error() {
    let (_tmp, store) = open_store().await;

    assert!(store.matches_on(day()).await.unwrap().is_empty());
    assert!(store.leagues_on(day()).await.unwrap().is_empty());
    assert!(store.teams_on(day()).await.unwrap().is_empty());
    assert!(store.last_update().await.unwrap().is_none());
}

#[tokio::test]
async fn open_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = DbConfig {
        path: tmp.path().join("matchday.sqlite"),
    };

    let first = SqliteStore::open(&config).await.unwrap();
    first.close().await;
    // Re-running migrations on an existing database must succeed.
    SqliteStore::open(&config).await.unwrap();
}

#[tokio::test]
async fn arsenal_chelsea_scenario() {
    let (_tmp, store) = open_store().await;

    let mut rec = record(1, "Premier League", "Arsenal", "Chelsea");
    rec.goals = vec![GoalEvent {
        minute: Some(23),
        team: "Arsenal".to_string(),
        player: "Saka".to_string(),
    }];
    store.save_matches(day(), &[rec.clone()]).await.unwrap();

    let matches = store.matches_on(day()).await.unwrap();
    assert_eq!(matches, vec![rec]);

    let leagues = store.leagues_on(day()).await.unwrap();
    assert_eq!(leagues.len(), 1);
    assert_eq!(leagues[0].name, "Premier League");
    assert_eq!(leagues[0].match_count, 1);

    let teams = store.teams_on(day()).await.unwrap();
    let mut pairs: Vec<(String, String)> = teams
        .into_iter()
        .map(|t| (t.name, t.league))
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("Arsenal".to_string(), "Premier League".to_string()),
            ("Chelsea".to_string(), "Premier League".to_string()),
        ]
    );
}

#[tokio::test]
async fn save_is_idempotent_per_date() {
    let (_tmp, store) = open_store().await;

    let records = vec![
        record(1, "Premier League", "Arsenal", "Chelsea"),
        record(2, "La Liga", "Real Madrid", "Sevilla"),
    ];
    store.save_matches(day(), &records).await.unwrap();
    store.save_matches(day(), &records).await.unwrap();

    let matches = store.matches_on(day()).await.unwrap();
    assert_eq!(matches.len(), 2);
}

#[tokio::test]
async fn save_replaces_the_whole_date() {
    let (_tmp, store) = open_store().await;

    store
        .save_matches(
            day(),
            &[
                record(1, "Premier League", "Arsenal", "Chelsea"),
                record(2, "Premier League", "Liverpool", "Everton"),
            ],
        )
        .await
        .unwrap();
    store
        .save_matches(day(), &[record(3, "La Liga", "Barcelona", "Girona")])
        .await
        .unwrap();

    let matches = store.matches_on(day()).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].fixture_id, 3);
}

#[tokio::test]
async fn dates_are_isolated() {
    let (_tmp, store) = open_store().await;

    store
        .save_matches(day(), &[record(1, "Premier League", "Arsenal", "Chelsea")])
        .await
        .unwrap();

    assert!(store.matches_on(other_day()).await.unwrap().is_empty());
    assert_eq!(store.matches_on(day()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn last_update_advances_on_save() {
    let (_tmp, store) = open_store().await;

    let before = chrono::Utc::now() - chrono::Duration::seconds(1);
    store
        .save_matches(day(), &[record(1, "Premier League", "Arsenal", "Chelsea")])
        .await
        .unwrap();

    let after = store.last_update().await.unwrap().unwrap();
    assert!(after >= before);
}

#[tokio::test]
async fn league_counts_reconcile() {
    let (_tmp, store) = open_store().await;

    store
        .save_matches(
            day(),
            &[
                record(1, "Premier League", "Arsenal", "Chelsea"),
                record(2, "Premier League", "Liverpool", "Everton"),
                record(3, "La Liga", "Real Madrid", "Sevilla"),
            ],
        )
        .await
        .unwrap();

    let matches = store.matches_on(day()).await.unwrap();
    let leagues = store.leagues_on(day()).await.unwrap();

    let total: i64 = leagues.iter().map(|l| l.match_count).sum();
    assert_eq!(total, matches.len() as i64);

    for league in &leagues {
        let expected = matches.iter().filter(|m| m.league == league.name).count() as i64;
        assert_eq!(league.match_count, expected);
    }
}

#[tokio::test]
async fn teams_cover_both_sides_without_duplicates() {
    let (_tmp, store) = open_store().await;

    // Arsenal appears in two fixtures; the pair must appear once.
    store
        .save_matches(
            day(),
            &[
                record(1, "Premier League", "Arsenal", "Chelsea"),
                record(2, "Premier League", "Everton", "Arsenal"),
            ],
        )
        .await
        .unwrap();

    let matches = store.matches_on(day()).await.unwrap();
    let teams = store.teams_on(day()).await.unwrap();

    for m in &matches {
        assert!(teams.iter().any(|t| t.name == m.home_team && t.league == m.league));
        assert!(teams.iter().any(|t| t.name == m.away_team && t.league == m.league));
    }

    let mut pairs: Vec<(String, String)> = teams
        .iter()
        .map(|t| (t.name.clone(), t.league.clone()))
        .collect();
    let len_before = pairs.len();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), len_before);
}

#[tokio::test]
async fn goal_events_round_trip() {
    let (_tmp, store) = open_store().await;

    let mut rec = record(1, "Premier League", "Arsenal", "Chelsea");
    rec.goals = vec![
        GoalEvent {
            minute: Some(23),
            team: "Arsenal".to_string(),
            player: "Saka".to_string(),
        },
        GoalEvent {
            minute: None,
            team: "Chelsea".to_string(),
            player: "Palmer".to_string(),
        },
    ];
    store.save_matches(day(), &[rec.clone()]).await.unwrap();

    let matches = store.matches_on(day()).await.unwrap();
    assert_eq!(matches[0].goals, rec.goals);
}

#[tokio::test]
async fn unfinished_scores_stay_absent() {
    let (_tmp, store) = open_store().await;

    let mut rec = record(1, "Serie A", "Inter", "Juventus");
    rec.home_score = None;
    rec.away_score = None;
    store.save_matches(day(), &[rec]).await.unwrap();

    let matches = store.matches_on(day()).await.unwrap();
    assert_eq!(matches[0].home_score, None);
    assert_eq!(matches[0].away_score, None);
}

//! Interactive session shell.
//!
//! Owns all session state — the target date, the usable-data flag, and the
//! source/store/engine handles — and drives the
//! startup → freshness check → ready loop flow. Command failures are
//! rendered and the loop continues; only `exit` words, end of input, or
//! Ctrl-C end the session.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::engine::QnaEngine;
use crate::errors::AppError;
use crate::fetcher::MatchSource;
use crate::store::MatchStore;

/// Cached data older than this triggers an automatic refresh at startup.
const STALE_AFTER_HOURS: i64 = 12;

/// Outcome of one dispatched input line.
enum Signal {
    Continue,
    Quit,
}

pub struct Shell {
    source: Box<dyn MatchSource>,
    store: Box<dyn MatchStore>,
    engine: QnaEngine,
    location: Option<String>,
    offline: bool,
    /// The single date every query and refresh in this session operates on:
    /// current UTC date minus one day, fixed at startup.
    target_date: NaiveDate,
    /// True once a refresh in this session saved a non-empty match set.
    /// Reset each run; questions are refused while false.
    data_usable: bool,
}

/// Stale when nothing was ever saved, or the last save is older than the
/// threshold.
fn is_stale(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_update {
        None => true,
        Some(ts) => now - ts > Duration::hours(STALE_AFTER_HOURS),
    }
}

fn yesterday_utc() -> NaiveDate {
    Utc::now().date_naive() - Duration::days(1)
}

impl Shell {
    pub fn new(
        source: Box<dyn MatchSource>,
        store: Box<dyn MatchStore>,
        engine: QnaEngine,
        location: Option<String>,
        offline: bool,
    ) -> Self {
        Self {
            source,
            store,
            engine,
            location,
            offline,
            target_date: yesterday_utc(),
            data_usable: false,
        }
    }

    /// Run the whole session. Returns `Ok` on every user-initiated exit
    /// path, including Ctrl-C.
    pub async fn run(&mut self, force_refresh: bool) -> anyhow::Result<()> {
        self.banner();

        if force_refresh {
            println!("Forcing data refresh...");
            self.refresh().await;
        }
        self.check_freshness().await;

        match self.ready_loop().await {
            Ok(()) => Ok(()),
            Err(AppError::UserAbort) => {
                println!("\nTerminated by user.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn banner(&self) {
        println!("matchday — football results Q&A");
        println!("Ask me anything about yesterday's matches.");
        println!();
        println!(
            "Current date and time (UTC): {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        println!("Target date: {}", self.target_date);
        println!("Type 'help' for available commands or 'exit' to quit.");
        if let Some(ref loc) = self.location {
            println!("Location: {}", loc);
        }
        if self.offline {
            println!("Running in offline mode with embedded test data.");
        }
    }

    async fn check_freshness(&mut self) {
        let last_update = match self.store.last_update().await {
            Ok(ts) => ts,
            Err(e) => {
                eprintln!("Could not read refresh state: {}", e);
                None
            }
        };

        if is_stale(last_update, Utc::now()) {
            println!("Match data is outdated. Refreshing...");
            self.refresh().await;
        } else if let Some(ts) = last_update {
            println!(
                "Using {} match data (last updated: {} UTC)",
                if self.offline { "test" } else { "cached" },
                ts.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    /// Fetch and save the target date's matches. Reports every outcome and
    /// never aborts the session; the usable-data flag only flips on a
    /// non-empty save.
    async fn refresh(&mut self) {
        println!(
            "Fetching matches for {} from {}...",
            self.target_date,
            self.source.name()
        );

        match self
            .source
            .fetch(self.target_date, self.location.as_deref())
            .await
        {
            Ok(records) if records.is_empty() => {
                println!("No matches found for {}.", self.target_date);
            }
            Ok(records) => match self.store.save_matches(self.target_date, &records).await {
                Ok(()) => {
                    self.data_usable = true;
                    println!("Successfully refreshed data. {} matches retrieved.", records.len());
                }
                Err(e) => eprintln!("Failed to save match data: {}", e),
            },
            Err(e) => eprintln!("Failed to refresh data: {}", e),
        }
    }

    async fn ready_loop(&mut self) -> Result<(), AppError> {
        let interactive = atty::is(atty::Stream::Stdin);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            if interactive {
                print!("\nask> ");
                let _ = std::io::stdout().flush();
            }

            let line = tokio::select! {
                _ = tokio::signal::ctrl_c() => return Err(AppError::UserAbort),
                line = lines.next_line() => match line {
                    Ok(Some(l)) => l,
                    // EOF (or unreadable stdin) behaves like `exit`.
                    Ok(None) | Err(_) => return Ok(()),
                },
            };

            match self.handle_line(&line).await {
                Ok(Signal::Quit) => return Ok(()),
                Ok(Signal::Continue) => {}
                Err(e) => eprintln!("Error: {}", e),
            }
        }
    }

    async fn handle_line(&mut self, raw: &str) -> Result<Signal, AppError> {
        let input = raw.trim().to_lowercase();

        match input.as_str() {
            "" => {}
            "exit" | "quit" | "q" => return Ok(Signal::Quit),
            "help" => self.show_help(),
            "refresh" | "update" => self.refresh().await,
            "leagues" | "competitions" => self.show_leagues().await?,
            "teams" => self.show_teams().await?,
            "matches" => self.show_matches().await?,
            question => self.answer_question(question).await?,
        }

        Ok(Signal::Continue)
    }

    fn show_help(&self) {
        println!("Available commands:");
        println!("  {:<22} {}", "help", "Show this help message");
        println!("  {:<22} {}", "exit, quit, q", "Exit the application");
        println!("  {:<22} {}", "refresh, update", "Refresh match data from the API");
        println!("  {:<22} {}", "leagues, competitions", "Show leagues with matches");
        println!("  {:<22} {}", "teams", "Show teams that played");
        println!("  {:<22} {}", "matches", "Show yesterday's results");
        println!("  {:<22} {}", "<question>", "Ask anything about yesterday's matches");
        println!();
        println!("Example questions:");
        println!("  - Who won the Premier League match yesterday?");
        println!("  - Did Manchester United play yesterday?");
        println!("  - How many goals were scored in La Liga?");
        println!("  - Who scored for Arsenal?");
    }

    async fn show_leagues(&self) -> Result<(), AppError> {
        let leagues = self.store.leagues_on(self.target_date).await?;

        if leagues.is_empty() {
            println!("No league data available.");
            return Ok(());
        }

        println!("{:<32} {:>7}", "LEAGUE", "MATCHES");
        for league in &leagues {
            println!("{:<32} {:>7}", league.name, league.match_count);
        }
        Ok(())
    }

    async fn show_teams(&self) -> Result<(), AppError> {
        let teams = self.store.teams_on(self.target_date).await?;

        if teams.is_empty() {
            println!("No team data available.");
            return Ok(());
        }

        println!("{:<28} {}", "TEAM", "LEAGUE");
        for team in &teams {
            println!("{:<28} {}", team.name, team.league);
        }
        Ok(())
    }

    async fn show_matches(&self) -> Result<(), AppError> {
        let matches = self.store.matches_on(self.target_date).await?;

        if matches.is_empty() {
            println!("No match data available for {}.", self.target_date);
            return Ok(());
        }

        println!(
            "{:<24} {:<22} {:^7} {}",
            "LEAGUE", "HOME", "SCORE", "AWAY"
        );
        for m in &matches {
            println!(
                "{:<24} {:<22} {:^7} {}",
                m.league,
                m.home_team,
                m.score_line(),
                m.away_team
            );
        }
        Ok(())
    }

    async fn answer_question(&mut self, question: &str) -> Result<(), AppError> {
        if !self.data_usable {
            println!("No data available yet. Run 'refresh' first, or restart with --refresh.");
            return Ok(());
        }

        let matches = self.store.matches_on(self.target_date).await?;
        if matches.is_empty() {
            println!("No match data available for {}. Possible reasons:", self.target_date);
            println!("  1. No matches were played that day");
            println!("  2. FOOTBALL_API_KEY is not configured");
            println!("  3. The local database cannot be read");
            println!("Try refreshing with the 'refresh' command.");
            return Ok(());
        }

        println!("Thinking ({})...", self.engine.provider_name());
        let answer = self.engine.answer(question, &matches).await?;

        println!();
        println!("--- Answer ---");
        println!("{}", answer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LlmClient;
    use crate::errors::Result as AppResult;
    use crate::models::MatchRecord;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubSource {
        outcome: StubOutcome,
    }

    enum StubOutcome {
        Records(Vec<MatchRecord>),
        Empty,
        Fail,
    }

    #[async_trait]
    impl MatchSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch(
            &self,
            _date: NaiveDate,
            _location: Option<&str>,
        ) -> AppResult<Vec<MatchRecord>> {
            match &self.outcome {
                StubOutcome::Records(records) => Ok(records.clone()),
                StubOutcome::Empty => Ok(Vec::new()),
                StubOutcome::Fail => Err(AppError::upstream("stub failure")),
            }
        }
    }

    struct CountingClient {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmClient for CountingClient {
        async fn complete(&self, _prompt: &str) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("stub answer".to_string())
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    fn record(fixture_id: i64) -> MatchRecord {
        MatchRecord {
            date: yesterday_utc(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            home_score: Some(2),
            away_score: Some(1),
            league: "Premier League".to_string(),
            fixture_id,
            goals: Vec::new(),
        }
    }

    fn shell(outcome: StubOutcome) -> (Shell, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let shell = Shell::new(
            Box::new(StubSource { outcome }),
            Box::new(MemoryStore::new()),
            QnaEngine::new(Box::new(CountingClient {
                calls: calls.clone(),
            })),
            None,
            true,
        );
        (shell, calls)
    }

    #[test]
    fn staleness_boundary() {
        let now = Utc::now();
        assert!(is_stale(None, now));
        assert!(is_stale(Some(now - Duration::hours(13)), now));
        assert!(!is_stale(Some(now - Duration::hours(1)), now));
    }

    #[tokio::test]
    async fn question_without_usable_data_skips_engine() {
        let (mut shell, calls) = shell(StubOutcome::Empty);
        shell.handle_line("who won yesterday?").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_fetch_leaves_flag_and_store_untouched() {
        let (mut shell, _) = shell(StubOutcome::Empty);
        shell.refresh().await;
        assert!(!shell.data_usable);
        assert!(shell.store.last_update().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_flag_and_loop_alive() {
        let (mut shell, _) = shell(StubOutcome::Fail);
        shell.refresh().await;
        assert!(!shell.data_usable);
        assert!(shell.store.last_update().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_refresh_flips_flag_and_saves() {
        let (mut shell, _) = shell(StubOutcome::Records(vec![record(1), record(2)]));
        shell.refresh().await;
        assert!(shell.data_usable);
        assert_eq!(
            shell.store.matches_on(shell.target_date).await.unwrap().len(),
            2
        );
        assert!(shell.store.last_update().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn question_after_refresh_calls_engine_once() {
        let (mut shell, calls) = shell(StubOutcome::Records(vec![record(1)]));
        shell.refresh().await;
        shell.handle_line("who won?").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exit_words_quit_and_blank_lines_do_not() {
        let (mut shell, _) = shell(StubOutcome::Empty);
        assert!(matches!(shell.handle_line("  Q  ").await.unwrap(), Signal::Quit));
        assert!(matches!(shell.handle_line("EXIT").await.unwrap(), Signal::Quit));
        assert!(matches!(shell.handle_line("quit").await.unwrap(), Signal::Quit));
        assert!(matches!(
            shell.handle_line("   ").await.unwrap(),
            Signal::Continue
        ));
    }

    #[tokio::test]
    async fn commands_are_case_normalized() {
        let (mut shell, calls) = shell(StubOutcome::Records(vec![record(1)]));
        // `Refresh` dispatches as a command, not a question.
        shell.handle_line("  Refresh ").await.unwrap();
        assert!(shell.data_usable);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

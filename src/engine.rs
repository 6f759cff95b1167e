//! Question answering over a day's match records.
//!
//! [`QnaEngine`] serializes the matches into a deterministic context block,
//! builds one prompt per question, and forwards it to an [`LlmClient`].
//! The only shipped client is [`OpenAiClient`] (chat completions); tests
//! substitute their own.
//!
//! Retry strategy mirrors the fetcher: 429/5xx and network errors retry
//! with exponential backoff, other client errors fail immediately.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::errors::{AppError, Result};
use crate::models::MatchRecord;

/// A language-model backend that turns one prompt into one text response.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
    fn provider_name(&self) -> &'static str;
}

// ============ OpenAI client ============

pub struct OpenAiClient {
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &ModelConfig, api_key: Option<String>) -> Self {
        Self {
            model: config.name.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AppError::MissingCredential("OPENAI_API_KEY"))?;

        let url = "https://api.openai.com/v1/chat/completions";
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(url)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .timeout(Duration::from_secs(self.timeout_secs))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| AppError::backend(format!("invalid response: {}", e)))?;

                        return json
                            .pointer("/choices/0/message/content")
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string())
                            .ok_or_else(|| AppError::backend("response missing content"));
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(AppError::backend(format!("HTTP {}: {}", status, body_text)));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(AppError::backend(format!("HTTP {}: {}", status, body_text)));
                }
                Err(e) => {
                    last_err = Some(AppError::backend(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AppError::backend("completion failed after retries")))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ============ Engine ============

/// Builds grounded prompts and issues one model call per question.
pub struct QnaEngine {
    client: Box<dyn LlmClient>,
}

impl QnaEngine {
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    /// Answer `question` from `matches`, returning the backend's text
    /// verbatim. Callers are expected to skip the call when `matches` is
    /// empty; an empty slice is passed through regardless.
    pub async fn answer(&self, question: &str, matches: &[MatchRecord]) -> Result<String> {
        let prompt = build_prompt(question, matches);
        self.client.complete(&prompt).await
    }
}

/// Serialize the matches into the grounding block, one line per match in
/// input order, goal events appended in scoring order. Same input, same
/// string — the model's context never depends on iteration order.
pub fn build_context(matches: &[MatchRecord]) -> String {
    let mut lines = Vec::with_capacity(matches.len());
    for m in matches {
        let mut line = format!(
            "- [{}] {} {} {}",
            m.league,
            m.home_team,
            m.score_line(),
            m.away_team
        );
        if m.home_score.is_none() || m.away_score.is_none() {
            line.push_str(" (not finished)");
        }
        if !m.goals.is_empty() {
            let scorers: Vec<String> = m
                .goals
                .iter()
                .map(|g| {
                    let minute = g
                        .minute
                        .map(|n| format!("{}'", n))
                        .unwrap_or_else(|| "?".to_string());
                    format!("{} {} ({})", minute, g.player, g.team)
                })
                .collect();
            line.push_str(&format!(" — goals: {}", scorers.join(", ")));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn build_prompt(question: &str, matches: &[MatchRecord]) -> String {
    let date = matches
        .first()
        .map(|m| m.date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "the requested date".to_string());

    format!(
        "You are a football results assistant. Answer the question using only \
         the match data below. If the data does not contain the answer, say so \
         plainly.\n\nMatches for {}:\n{}\n\nQuestion: {}",
        date,
        build_context(matches),
        question
    )
}

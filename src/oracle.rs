//! External sentiment scoring.
//!
//! The oracle rates a piece of text with an integer from 1 (very negative)
//! to 10 (very positive). [`GeminiOracle`] calls the Gemini
//! `generateContent` REST endpoint; the API key comes from
//! `GEMINI_API_KEY` and is re-read on every call, so a key added to the
//! environment after startup is picked up without a restart.
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, ...)
//! - other 4xx → [`OracleError::Rejected`], no retry
//! - network error → retry, then [`OracleError::Http`]

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use scrapqt_core::score::{RAW_MAX, RAW_MIN};

use crate::config::EnrichmentConfig;
use crate::error::OracleError;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Something that can rate text on the 1..=10 scale.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Fail fast when no call could succeed (e.g. no credential).
    fn check_ready(&self) -> Result<(), OracleError>;

    /// Raw score in `1..=10`.
    async fn score(&self, text: &str) -> Result<i64, OracleError>;
}

/// Build the prompt sent to the model.
pub fn build_prompt(text: &str) -> String {
    format!(
        "Analyze the sentiment of the following text and return a single integer score \
         from {} (very negative) to {} (very positive). Only return the integer, nothing else.\n\n\
         Text: \"{}\"\nScore: ",
        RAW_MIN, RAW_MAX, text
    )
}

/// Parse the model's answer into a raw score.
pub fn parse_score(answer: &str) -> Result<i64, OracleError> {
    let trimmed = answer.trim();
    match trimmed.parse::<i64>() {
        Ok(score) if (RAW_MIN..=RAW_MAX).contains(&score) => Ok(score),
        _ => Err(OracleError::InvalidScore(trimmed.to_string())),
    }
}

enum KeySource {
    Env,
    Fixed(Option<String>),
}

pub struct GeminiOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: u32,
    key: KeySource,
}

impl GeminiOracle {
    /// Oracle that reads its key from `GEMINI_API_KEY`.
    pub fn from_env(config: &EnrichmentConfig) -> Result<Self, OracleError> {
        Self::build(config, KeySource::Env)
    }

    /// Oracle with a fixed key, or none at all.
    pub fn with_key(config: &EnrichmentConfig, key: Option<String>) -> Result<Self, OracleError> {
        Self::build(config, KeySource::Fixed(key))
    }

    fn build(config: &EnrichmentConfig, key: KeySource) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            key,
        })
    }

    fn api_key(&self) -> Option<String> {
        let key = match &self.key {
            KeySource::Env => std::env::var(API_KEY_VAR).ok(),
            KeySource::Fixed(k) => k.clone(),
        };
        key.filter(|k| !k.trim().is_empty())
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ScoringOracle for GeminiOracle {
    fn check_ready(&self) -> Result<(), OracleError> {
        match self.api_key() {
            Some(_) => Ok(()),
            None => Err(OracleError::MissingCredential),
        }
    }

    async fn score(&self, text: &str) -> Result<i64, OracleError> {
        let key = self.api_key().ok_or(OracleError::MissingCredential)?;
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": build_prompt(text) }] }]
        });

        let mut last_error: Option<OracleError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying scoring oracle");
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(self.endpoint())
                .header("x-goog-api-key", &key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: GenerateResponse = response.json().await?;
                        return parse_score(&parsed.text());
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "scoring oracle unavailable");
                        last_error = Some(OracleError::Rejected(format!("{}: {}", status, body_text)));
                        continue;
                    }

                    return Err(OracleError::Rejected(format!("{}: {}", status, body_text)));
                }
                Err(e) => {
                    warn!(error = %e, attempt, "scoring oracle request failed");
                    last_error = Some(OracleError::Http(e));
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| OracleError::Rejected("retries exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_in_range_parse() {
        assert_eq!(parse_score("7").unwrap(), 7);
        assert_eq!(parse_score(" 10\n").unwrap(), 10);
        assert_eq!(parse_score("1").unwrap(), 1);
    }

    #[test]
    fn unusable_answers_rejected() {
        for answer in ["0", "11", "7.5", "seven", "", "Score: 8"] {
            assert!(
                matches!(parse_score(answer), Err(OracleError::InvalidScore(_))),
                "{:?} should be rejected",
                answer
            );
        }
    }

    #[test]
    fn prompt_embeds_text() {
        let prompt = build_prompt("Great mouse, works well");
        assert!(prompt.contains("\"Great mouse, works well\""));
        assert!(prompt.contains("from 1 (very negative) to 10 (very positive)"));
    }

    #[tokio::test]
    async fn missing_key_is_a_precondition_failure() {
        let oracle = GeminiOracle::with_key(&EnrichmentConfig::default(), None).unwrap();
        let err = oracle.check_ready().unwrap_err();
        assert!(err.is_precondition());
        let err = oracle.score("anything").await.unwrap_err();
        assert!(matches!(err, OracleError::MissingCredential));

        let blank = GeminiOracle::with_key(&EnrichmentConfig::default(), Some("  ".into())).unwrap();
        assert!(blank.check_ready().is_err());
    }

    #[test]
    fn response_text_joins_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"8"},{"text":"\n"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parse_score(&parsed.text()).unwrap(), 8);

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.text(), "");
    }
}

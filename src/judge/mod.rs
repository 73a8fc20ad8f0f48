//! External answer-matching oracle
//!
//! A judge semantically compares a free-text guess against the board of known
//! answers. Judges are fallible and slow (they sit on a network); every call
//! is bounded by a timeout and failures surface as a recoverable
//! [`JudgeError`], never a crash.

mod ollama;
mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use ollama::OllamaJudge;
pub use openai::OpenAiJudge;

/// Result type for judge operations
pub type JudgeResult<T> = Result<T, JudgeError>;

/// Errors that can occur while consulting the judge
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// The judge's ruling on one guess.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    #[serde(rename = "match")]
    pub matched: bool,
    #[serde(default, rename = "matchedAnswer")]
    pub matched_answer: String,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub reason: String,
}

/// Trait every judge backend implements
#[async_trait]
pub trait AnswerJudge: Send + Sync {
    /// Rule whether `player_answer` matches any of the board answers.
    async fn judge(
        &self,
        question: &str,
        board_answers: &[String],
        player_answer: &str,
    ) -> JudgeResult<Verdict>;

    /// Name of this backend
    fn name(&self) -> &str;
}

/// Prompt sent to chat-style backends. The model is instructed to reply with
/// the verdict JSON and nothing else.
pub(crate) fn build_judge_prompt(
    question: &str,
    board_answers: &[String],
    player_answer: &str,
) -> String {
    let board = board_answers
        .iter()
        .enumerate()
        .map(|(idx, ans)| format!("{}. {}", idx + 1, ans))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are judging a Family Feud game. Given the question and the list of correct answers on the board, determine if the player's answer matches or is close enough to any of the correct answers.

Question: "{question}"

Correct answers on the board:
{board}

Player's answer: "{player_answer}"

Please respond with ONLY a JSON object in this exact format:
{{
  "match": true or false,
  "matchedAnswer": "the exact answer from the board that matches, or empty string if no match",
  "confidence": "high", "medium", or "low",
  "reason": "brief explanation"
}}

Be lenient - if the player's answer is essentially the same meaning or a close variation of a correct answer, consider it a match. For example, "car" matches "Car", "automobile" could match "Car", "lipstick" matches "Lipstick", etc."#
    )
}

/// Parse a verdict out of raw model output, tolerating markdown code fences.
pub(crate) fn parse_verdict(raw: &str) -> JudgeResult<Verdict> {
    let cleaned = raw
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    serde_json::from_str(&cleaned).map_err(|e| JudgeError::ParseError(e.to_string()))
}

/// Configuration for judge backends
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    /// OpenAI model to use
    pub openai_model: String,
    /// Ollama base URL (only used when no OpenAI key is set)
    pub ollama_base_url: Option<String>,
    /// Ollama model to use
    pub ollama_model: String,
    /// Timeout for judge requests
    pub timeout: Duration,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: None,
            ollama_model: "llama3.2".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl JudgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let non_empty = |v: String| {
            let trimmed = v.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().and_then(non_empty),
            openai_model: std::env::var("OPENAI_MODEL")
                .ok()
                .and_then(non_empty)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL").ok().and_then(non_empty),
            ollama_model: std::env::var("OLLAMA_MODEL")
                .ok()
                .and_then(non_empty)
                .unwrap_or_else(|| "llama3.2".to_string()),
            timeout: std::env::var("JUDGE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30)),
        }
    }

    /// Build the configured judge. OpenAI wins when both are configured.
    pub fn build_judge(&self) -> JudgeResult<Box<dyn AnswerJudge>> {
        if let Some(api_key) = &self.openai_api_key {
            return Ok(Box::new(OpenAiJudge::new(
                api_key.clone(),
                self.openai_model.clone(),
                self.timeout,
            )));
        }

        if let Some(base_url) = &self.ollama_base_url {
            return Ok(Box::new(OllamaJudge::new(
                base_url.clone(),
                self.ollama_model.clone(),
                self.timeout,
            )));
        }

        Err(JudgeError::ConfigError(
            "No judge configured. Set OPENAI_API_KEY or OLLAMA_BASE_URL".to_string(),
        ))
    }
}

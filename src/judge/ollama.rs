use super::*;

/// Judge backed by a local Ollama model
pub struct OllamaJudge {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaJudge {
    /// Create a new judge pointed at the given Ollama instance
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");

        Self {
            base_url,
            model,
            client,
            timeout,
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
}

#[derive(Debug, serde::Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl AnswerJudge for OllamaJudge {
    async fn judge(
        &self,
        question: &str,
        board_answers: &[String],
        player_answer: &str,
    ) -> JudgeResult<Verdict> {
        let ollama_request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: build_judge_prompt(question, board_answers, player_answer),
            stream: false,
            // Constrains the model to emit a single JSON object
            format: "json",
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = tokio::time::timeout(
            self.timeout,
            self.client.post(&url).json(&ollama_request).send(),
        )
        .await
        .map_err(|_| JudgeError::Timeout(self.timeout))?
        .map_err(|e| JudgeError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JudgeError::ApiError(format!(
                "Ollama API returned status: {}",
                response.status()
            )));
        }

        let ollama_response: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::ParseError(e.to_string()))?;

        parse_verdict(&ollama_response.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Only run with Ollama running locally
    async fn test_ollama_judge() {
        let judge = OllamaJudge::new(
            "http://localhost:11434".to_string(),
            "llama3.2".to_string(),
            Duration::from_secs(30),
        );

        let board = vec!["Apple".to_string(), "Banana".to_string()];
        let verdict = judge.judge("Name a fruit", &board, "apple").await.unwrap();

        assert!(verdict.matched);
        println!("Verdict: {:?}", verdict);
    }
}

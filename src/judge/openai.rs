use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that judges Family Feud answers. Always respond with valid JSON only.";

/// OpenAI-backed judge
pub struct OpenAiJudge {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiJudge {
    /// Create a new judge with the given API key and model
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);

        Self {
            client,
            model,
            timeout,
        }
    }
}

#[async_trait]
impl AnswerJudge for OpenAiJudge {
    async fn judge(
        &self,
        question: &str,
        board_answers: &[String],
        player_answer: &str,
    ) -> JudgeResult<Verdict> {
        let prompt = build_judge_prompt(question, board_answers, player_answer);

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.3)
            .max_tokens(200u32)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| JudgeError::ApiError(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| JudgeError::ApiError(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| JudgeError::ApiError(e.to_string()))?;

        let response =
            tokio::time::timeout(self.timeout, self.client.chat().create(chat_request))
                .await
                .map_err(|_| JudgeError::Timeout(self.timeout))?
                .map_err(|e| JudgeError::ApiError(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| JudgeError::ParseError("No content in response".to_string()))?;

        parse_verdict(&text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

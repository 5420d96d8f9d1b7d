//! OpenRouter 分類器（OpenAI 相容的 chat completions API）。

use crate::domain::ports::Classifier;
use crate::utils::error::{IdeaFilterError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub struct OpenRouterSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl OpenRouterSettings {
    /// 日誌中只顯示金鑰頭尾
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 9 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..5].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl fmt::Debug for OpenRouterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.masked_key())
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

pub struct OpenRouterClassifier {
    client: Client,
    settings: OpenRouterSettings,
}

impl OpenRouterClassifier {
    pub fn new(settings: OpenRouterSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        tracing::debug!(
            model = %settings.model,
            api_key = %settings.masked_key(),
            "Configured OpenRouter classifier"
        );
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Classifier for OpenRouterClassifier {
    async fn classify(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.settings.temperature,
        };

        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdeaFilterError::ClassifierError {
                message: format!("HTTP {}: {}", status, body.trim()),
            });
        }

        let completion: ChatResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| IdeaFilterError::ClassifierError {
                message: "completion contained no message content".to_string(),
            })
    }
}

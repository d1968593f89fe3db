use anyhow::{Context, Result};
use tracing::debug;

use clearplate_core::chat::{ChatRequest, ChatSettings, extract_content};
use clearplate_core::error::{AnalysisError, excerpt};
use clearplate_core::service::CompletionProvider;

use crate::config::Config;

/// OpenAI-compatible chat-completions client.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    settings: ChatSettings,
}

impl ChatCompletionClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "clearplate/{} (meal analysis)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(config.timeout)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            settings: config.chat.clone(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl CompletionProvider for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AnalysisError::Config(
                "No API key configured. Set CLEARPLATE_API_KEY or OPENAI_API_KEY".to_string(),
            ));
        };

        let request = ChatRequest::user(&self.settings, prompt);
        debug!(endpoint = %self.endpoint, model = %self.settings.model, "sending chat completion");

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Api(format!("Failed to reach chat API: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AnalysisError::Api(format!("Failed to read chat API response: {e}")))?;

        if !status.is_success() {
            return Err(AnalysisError::Api(format!(
                "Chat API returned {status}: {}",
                excerpt(&body)
            )));
        }

        extract_content(&body)
    }
}

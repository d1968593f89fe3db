use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, excerpt};

/// Per-request knobs passed through to the provider untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatRequest {
    /// Single user-turn request carrying `prompt`.
    #[must_use]
    pub fn user(settings: &ChatSettings, prompt: &str) -> Self {
        Self {
            model: settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

/// Pull `choices[0].message.content` out of a chat-completion body.
///
/// A body that is not a chat-completion response at all is a parse error; a
/// well-formed response without content is an API error.
pub fn extract_content(body: &str) -> Result<String, AnalysisError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::parse(format!("invalid chat response: {e}"), body))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            AnalysisError::Api(format!(
                "response has no message content: {}",
                excerpt(body)
            ))
        })
}

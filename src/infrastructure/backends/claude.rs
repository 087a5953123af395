#[cfg(test)]
#[path = "claude_test.rs"]
mod tests;

use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::malformed;
use super::status_error;
use super::transport_error;
use super::Connection;
use crate::domain::models::Backend;
use crate::domain::models::BackendPrompt;
use crate::domain::models::LlmError;
use crate::domain::models::ProviderName;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessageRequest {
    role: String,
    content: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<MessageRequest>,
    temperature: f32,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ContentBlockResponse {
    #[serde(rename = "type")]
    _type: String,
    #[serde(default)]
    text: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    content: Vec<ContentBlockResponse>,
}

pub struct Claude {
    connection: Connection,
}

impl Claude {
    pub fn new(connection: Connection) -> Claude {
        return Claude { connection };
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        return req
            .timeout(self.connection.timeout)
            .header("x-api-key", &self.connection.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
    }
}

#[async_trait]
impl Backend for Claude {
    fn name(&self) -> ProviderName {
        return ProviderName::Claude;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<(), LlmError> {
        if let Some(err) = self.connection.missing_api_key(ProviderName::Claude) {
            return Err(err);
        }

        let res = self
            .request(reqwest::Client::new().get(format!("{url}/models", url = self.connection.url)))
            .send()
            .await
            .map_err(|err| return transport_error(ProviderName::Claude, err))?;

        if !res.status().is_success() {
            return Err(status_error(ProviderName::Claude, res).await);
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn get_completion(&self, prompt: &BackendPrompt) -> Result<String, LlmError> {
        if let Some(err) = self.connection.missing_api_key(ProviderName::Claude) {
            return Err(err);
        }

        let req = CompletionRequest {
            model: self.connection.model.to_string(),
            max_tokens: MAX_TOKENS,
            system: prompt.system.to_string(),
            messages: vec![MessageRequest {
                role: "user".to_string(),
                content: prompt.text.to_string(),
            }],
            temperature: 0.0,
        };

        tracing::debug!(
            model = %req.model,
            url = %self.connection.url,
            has_script = prompt.script.is_some(),
            has_error_log = prompt.error_log.is_some(),
            "Requesting completion from Claude"
        );

        let res = self
            .request(reqwest::Client::new().post(format!("{url}/messages", url = self.connection.url)))
            .json(&req)
            .send()
            .await
            .map_err(|err| return transport_error(ProviderName::Claude, err))?;

        if !res.status().is_success() {
            return Err(status_error(ProviderName::Claude, res).await);
        }

        let body = res
            .text()
            .await
            .map_err(|err| return transport_error(ProviderName::Claude, err))?;
        let ores: CompletionResponse = serde_json::from_str(&body)
            .map_err(|err| return malformed(ProviderName::Claude, err))?;
        tracing::debug!(body = ?ores, "Completion response");

        let text = ores
            .content
            .iter()
            .filter(|block| return block._type == "text")
            .map(|block| return block.text.as_str())
            .collect::<Vec<&str>>()
            .join("");

        if text.trim().is_empty() {
            return Err(malformed(ProviderName::Claude, "no text content blocks"));
        }

        return Ok(text);
    }
}

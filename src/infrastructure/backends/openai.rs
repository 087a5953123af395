#[cfg(test)]
#[path = "openai_test.rs"]
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

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessageRequest {
    role: String,
    content: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<MessageRequest>,
    temperature: f32,
    stream: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionMessageResponse {
    content: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionChoiceResponse {
    message: CompletionMessageResponse,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoiceResponse>,
}

/// Client for the OpenAI chat completions dialect, which DeepSeek, Ollama and
/// most self hosted gateways speak as well.
pub struct OpenAI {
    provider: ProviderName,
    connection: Connection,
}

impl OpenAI {
    pub fn new(provider: ProviderName, connection: Connection) -> OpenAI {
        return OpenAI {
            provider,
            connection,
        };
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.timeout(self.connection.timeout);
        if self.connection.api_key.is_empty() {
            return req;
        }

        return req.bearer_auth(&self.connection.api_key);
    }
}

#[async_trait]
impl Backend for OpenAI {
    fn name(&self) -> ProviderName {
        return self.provider;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<(), LlmError> {
        if let Some(err) = self.connection.missing_api_key(self.provider) {
            return Err(err);
        }

        let res = self
            .request(reqwest::Client::new().get(format!("{url}/models", url = self.connection.url)))
            .send()
            .await
            .map_err(|err| return transport_error(self.provider, err))?;

        if !res.status().is_success() {
            return Err(status_error(self.provider, res).await);
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn get_completion(&self, prompt: &BackendPrompt) -> Result<String, LlmError> {
        if let Some(err) = self.connection.missing_api_key(self.provider) {
            return Err(err);
        }

        let mut messages: Vec<MessageRequest> = vec![];
        if !prompt.system.is_empty() {
            messages.push(MessageRequest {
                role: "system".to_string(),
                content: prompt.system.to_string(),
            });
        }
        messages.push(MessageRequest {
            role: "user".to_string(),
            content: prompt.text.to_string(),
        });

        let req = CompletionRequest {
            model: self.connection.model.to_string(),
            messages,
            temperature: 0.0,
            stream: false,
        };

        tracing::debug!(
            provider = %self.provider,
            model = %req.model,
            url = %self.connection.url,
            has_script = prompt.script.is_some(),
            has_error_log = prompt.error_log.is_some(),
            "Requesting completion"
        );

        let res = self
            .request(
                reqwest::Client::new()
                    .post(format!("{url}/chat/completions", url = self.connection.url)),
            )
            .json(&req)
            .send()
            .await
            .map_err(|err| return transport_error(self.provider, err))?;

        if !res.status().is_success() {
            return Err(status_error(self.provider, res).await);
        }

        let body = res
            .text()
            .await
            .map_err(|err| return transport_error(self.provider, err))?;
        let ores: CompletionResponse =
            serde_json::from_str(&body).map_err(|err| return malformed(self.provider, err))?;
        tracing::debug!(body = ?ores, "Completion response");

        let text = ores
            .choices
            .into_iter()
            .next()
            .and_then(|choice| return choice.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(malformed(self.provider, "no text in the first choice"));
        }

        return Ok(text);
    }
}

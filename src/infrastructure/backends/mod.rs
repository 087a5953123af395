#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub mod claude;
pub mod openai;

use std::env;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendBox;
use crate::domain::models::LlmError;
use crate::domain::models::ProviderName;

const ERROR_BODY_LIMIT: usize = 200;

/// Where and how to reach a provider. The API key is kept out of `Debug`
/// output so it never ends up in logs.
#[derive(Clone)]
pub struct Connection {
    pub url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("Connection")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish();
    }
}

impl Connection {
    pub fn from_config(provider: ProviderName) -> Result<Connection> {
        let mut api_key = Config::get(ConfigKey::ApiKey);
        if api_key.is_empty() {
            api_key = provider
                .api_key_vars()
                .iter()
                .find_map(|var| {
                    return env::var(var).ok().filter(|val| return !val.is_empty());
                })
                .unwrap_or_default();
        }

        return Ok(Connection {
            url: Config::get_or(ConfigKey::BaseUrl, provider.default_url())
                .trim_end_matches('/')
                .to_string(),
            model: Config::get_or(ConfigKey::Model, provider.default_model()),
            api_key,
            timeout: Duration::from_secs(Config::parse::<u64>(ConfigKey::LlmTimeout)?),
        });
    }

    fn missing_api_key(&self, provider: ProviderName) -> Option<LlmError> {
        if self.api_key.is_empty() && provider.requires_api_key() {
            return Some(LlmError::Auth(format!(
                "no API key configured for {provider}"
            )));
        }

        return None;
    }
}

fn transport_error(provider: ProviderName, err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        tracing::error!(provider = %provider, "Request timed out");
        return LlmError::Network(format!("request to {provider} timed out"));
    }

    tracing::error!(provider = %provider, error = %err, "Provider is not reachable");
    return LlmError::Network(format!("{provider} is not reachable: {err}"));
}

async fn status_error(provider: ProviderName, res: reqwest::Response) -> LlmError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let body = body.trim().chars().take(ERROR_BODY_LIMIT).collect::<String>();
    tracing::error!(
        provider = %provider,
        status = status.as_u16(),
        "Completion request failed"
    );

    let detail = format!("{provider} responded with {status}: {body}");
    match status.as_u16() {
        401 | 403 => return LlmError::Auth(detail),
        429 => return LlmError::RateLimited(detail),
        _ => return LlmError::Network(detail),
    }
}

fn malformed(provider: ProviderName, err: impl std::fmt::Display) -> LlmError {
    tracing::error!(provider = %provider, error = %err, "Unexpected completion response");
    return LlmError::MalformedResponse(format!("{provider} sent an unexpected body: {err}"));
}

pub struct BackendManager {}

impl BackendManager {
    pub fn get(name: ProviderName) -> Result<BackendBox> {
        let connection = Connection::from_config(name)?;
        if connection.url.is_empty() {
            bail!(format!(
                "No base URL configured for the {name} provider, set one with --base-url"
            ));
        }
        if connection.model.is_empty() {
            bail!(format!(
                "No model configured for the {name} provider, set one with --model"
            ));
        }

        if name == ProviderName::Claude {
            return Ok(Box::new(claude::Claude::new(connection)));
        }

        return Ok(Box::new(openai::OpenAI::new(name, connection)));
    }
}

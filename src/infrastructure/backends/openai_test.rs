use std::time::Duration;

use anyhow::Result;
use mockito::Matcher;
use serde_json::json;

use super::CompletionChoiceResponse;
use super::CompletionMessageResponse;
use super::CompletionResponse;
use super::OpenAI;
use crate::domain::models::Backend;
use crate::domain::models::BackendPrompt;
use crate::domain::models::LlmError;
use crate::domain::models::ProviderName;
use crate::infrastructure::backends::Connection;

impl OpenAI {
    fn with_url(url: String) -> OpenAI {
        return OpenAI::with_key(url, "abc");
    }

    fn with_key(url: String, api_key: &str) -> OpenAI {
        return OpenAI::new(
            ProviderName::OpenAI,
            Connection {
                url,
                model: "gpt-4o".to_string(),
                api_key: api_key.to_string(),
                timeout: Duration::from_millis(500),
            },
        );
    }
}

fn completion_body(content: Option<&str>) -> Result<String> {
    let body = serde_json::to_string(&CompletionResponse {
        choices: vec![CompletionChoiceResponse {
            message: CompletionMessageResponse {
                content: content.map(|e| return e.to_string()),
            },
        }],
    })?;

    return Ok(body);
}

#[tokio::test]
async fn it_successfully_health_checks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/models")
        .match_header("authorization", "Bearer abc")
        .with_status(200)
        .with_body(r#"{"data": []}"#)
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn it_fails_health_checks_with_a_bad_key() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/models")
        .with_status(401)
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let res = backend.health_check().await;

    assert!(matches!(res, Err(LlmError::Auth(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_gets_completions() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer abc")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "temperature": 0.0,
            "stream": false,
            "messages": [
                { "role": "system", "content": "Be brief." },
                { "role": "user", "content": "Say hi to the world" },
            ],
        })))
        .with_status(200)
        .with_body(completion_body(Some("Hello World"))?)
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let res = backend
        .get_completion(&BackendPrompt::new("Be brief.", "Say hi to the world"))
        .await?;

    mock.assert_async().await;
    assert_eq!(res, "Hello World");
    return Ok(());
}

#[tokio::test]
async fn it_maps_rate_limits() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let res = backend
        .get_completion(&BackendPrompt::new("", "Say hi"))
        .await;

    mock.assert_async().await;
    assert_eq!(
        res,
        Err(LlmError::RateLimited(
            "openai responded with 429 Too Many Requests: slow down".to_string()
        ))
    );
}

#[tokio::test]
async fn it_rejects_bodies_without_text() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(completion_body(None)?)
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let res = backend
        .get_completion(&BackendPrompt::new("", "Say hi"))
        .await;

    mock.assert_async().await;
    assert!(matches!(res, Err(LlmError::MalformedResponse(_))));
    return Ok(());
}

#[tokio::test]
async fn it_rejects_bodies_that_are_not_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let res = backend
        .get_completion(&BackendPrompt::new("", "Say hi"))
        .await;

    mock.assert_async().await;
    assert!(matches!(res, Err(LlmError::MalformedResponse(_))));
}

#[tokio::test]
async fn it_rejects_missing_keys_before_sending() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let backend = OpenAI::with_key(server.url(), "");
    let res = backend
        .get_completion(&BackendPrompt::new("", "Say hi"))
        .await;

    mock.assert_async().await;
    assert_eq!(
        res,
        Err(LlmError::Auth("no API key configured for openai".to_string()))
    );
}

#[tokio::test]
async fn it_maps_unreachable_servers_to_network_errors() {
    let backend = OpenAI::with_url("http://127.0.0.1:1".to_string());
    let res = backend
        .get_completion(&BackendPrompt::new("", "Say hi"))
        .await;

    assert!(matches!(res, Err(LlmError::Network(_))));
}

#[tokio::test]
async fn it_allows_ollama_without_a_key() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(completion_body(Some("print('hi')"))?)
        .create_async()
        .await;

    let backend = OpenAI::new(
        ProviderName::Ollama,
        Connection {
            url: server.url(),
            model: "llama3.2".to_string(),
            api_key: "".to_string(),
            timeout: Duration::from_millis(500),
        },
    );
    let res = backend
        .get_completion(&BackendPrompt::new("", "Say hi"))
        .await?;

    mock.assert_async().await;
    assert_eq!(res, "print('hi')");
    return Ok(());
}

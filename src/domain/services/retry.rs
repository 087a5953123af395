#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::LlmError;
use crate::domain::models::RefineError;

pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        return LlmError::is_retryable(self);
    }
}

impl Retryable for RefineError {
    fn is_retryable(&self) -> bool {
        match self {
            RefineError::LlmCallFailed(err) => return err.is_retryable(),
            RefineError::RefinementParseError => return false,
        }
    }
}

/// Caller side retry with exponential backoff. The LLM client itself never
/// retries, commands wrap the calls they want retried in this.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total number of tries, including the first one.
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        return RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1000),
        };
    }
}

impl RetryPolicy {
    pub fn from_config() -> Result<RetryPolicy> {
        return Ok(RetryPolicy {
            attempts: Config::parse::<u32>(ConfigKey::LlmRetries)?,
            base_delay: Duration::from_millis(Config::parse::<u64>(ConfigKey::LlmRetryDelay)?),
        });
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        return self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    }

    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = label,
                        attempt = attempt,
                        attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

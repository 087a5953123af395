use thiserror::Error;

/// Failures of a single call to a completion endpoint. Every variant is
/// surfaced to the caller as-is so it can react differently to each one.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("authentication with the LLM provider failed: {0}")]
    Auth(String),
    #[error("rate limited by the LLM provider: {0}")]
    RateLimited(String),
    #[error("network error while calling the LLM provider: {0}")]
    Network(String),
    #[error("malformed response from the LLM provider: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Rate limits and transport failures may succeed when tried again,
    /// everything else needs the user to change something first.
    pub fn is_retryable(&self) -> bool {
        return matches!(self, LlmError::RateLimited(_) | LlmError::Network(_));
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("recorder is unavailable: {0}")]
    RecorderUnavailable(String),
    #[error("recording aborted: {0}")]
    RecordingAborted(String),
}

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("LLM call failed: {0}")]
    LlmCallFailed(#[from] LlmError),
    #[error("no runnable code could be extracted from the LLM response")]
    RefinementParseError,
}

#[derive(Debug, Error)]
pub enum FixAttemptError {
    #[error("LLM call failed: {0}")]
    LlmCallFailed(#[from] LlmError),
    #[error("no runnable code could be extracted from the LLM response")]
    EmptyResponse,
    #[error("the fix was not run, {0}")]
    Rejected(#[from] ValidationError),
}

#[derive(Debug, Error)]
#[error("unable to {action}: {source}")]
pub struct ExecutionSetupError {
    action: String,
    #[source]
    source: std::io::Error,
}

impl ExecutionSetupError {
    pub fn new(action: &str, source: std::io::Error) -> ExecutionSetupError {
        return ExecutionSetupError {
            action: action.to_string(),
            source,
        };
    }
}

#[derive(Debug, Error)]
#[error("script failed validation: {}", .issues.join("; "))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

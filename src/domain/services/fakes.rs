use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::Backend;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ExecutionResult;
use crate::domain::models::ExecutionSetupError;
use crate::domain::models::Executor;
use crate::domain::models::LlmError;
use crate::domain::models::ProviderName;

/// Backend answering with a fixed queue of responses and remembering every
/// prompt it was sent. Clones share their state.
#[derive(Clone)]
pub struct ScriptedBackend {
    responses: Arc<Mutex<VecDeque<Result<String, LlmError>>>>,
    prompts: Arc<Mutex<Vec<BackendPrompt>>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> ScriptedBackend {
        return ScriptedBackend {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            prompts: Arc::new(Mutex::new(vec![])),
        };
    }

    pub fn calls(&self) -> usize {
        return self.prompts.lock().unwrap().len();
    }

    pub fn prompts(&self) -> Vec<BackendPrompt> {
        return self.prompts.lock().unwrap().clone();
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> ProviderName {
        return ProviderName::Custom;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<(), LlmError> {
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn get_completion(&self, prompt: &BackendPrompt) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        return self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| return Err(LlmError::Network("no scripted response left".to_string())));
    }
}

/// Executor that never spawns anything. Scripts containing `fail` exit with
/// a NameError trace, scripts containing `hang` time out, everything else
/// prints its own text. Clones share their state.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    scripts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedExecutor {
    pub fn runs(&self) -> usize {
        return self.scripts.lock().unwrap().len();
    }

    pub fn scripts(&self) -> Vec<String> {
        return self.scripts.lock().unwrap().clone();
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    #[allow(clippy::implicit_return)]
    async fn execute(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionSetupError> {
        self.scripts.lock().unwrap().push(script.to_string());

        if script.contains("hang") {
            return Ok(ExecutionResult {
                exit_code: None,
                stdout: "".to_string(),
                stderr: "".to_string(),
                timed_out: true,
                duration: timeout,
            });
        }

        if script.contains("fail") {
            return Ok(ExecutionResult {
                exit_code: Some(1),
                stdout: "".to_string(),
                stderr: "Traceback (most recent call last):\n  File \"script.py\", line 1, in <module>\nNameError: name 'greeting' is not defined\n".to_string(),
                timed_out: false,
                duration: Duration::from_millis(20),
            });
        }

        return Ok(ExecutionResult {
            exit_code: Some(0),
            stdout: format!("{script}\n"),
            stderr: "".to_string(),
            timed_out: false,
            duration: Duration::from_millis(20),
        });
    }
}

use std::time::Duration;

use async_trait::async_trait;

use super::ExecutionResult;
use super::ExecutionSetupError;

#[async_trait]
pub trait Executor {
    /// Runs `script` in its own process for at most `timeout`. A script that
    /// fails or times out is reported through the `ExecutionResult`, only
    /// problems starting the process are errors.
    async fn execute(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionSetupError>;
}

pub type ExecutorBox = Box<dyn Executor + Send + Sync>;

#[cfg(test)]
#[path = "refiner_test.rs"]
mod tests;

use super::extract_script;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendPrompt;
use crate::domain::models::RefineError;

/// Rewrites a raw recording into logically named steps matching the task.
pub struct Refiner<'a> {
    backend: &'a BackendBox,
}

impl<'a> Refiner<'a> {
    pub fn new(backend: &'a BackendBox) -> Refiner<'a> {
        return Refiner { backend };
    }

    /// Calls the backend exactly once. Failures are returned to the caller,
    /// which owns any retry policy.
    pub async fn refine(&self, raw_script: &str, task: &str) -> Result<String, RefineError> {
        tracing::info!(
            provider = %self.backend.name(),
            raw_script_bytes = raw_script.len(),
            "Refining recorded script"
        );

        let prompt = BackendPrompt::refine(task, raw_script);
        let response = self.backend.get_completion(&prompt).await?;

        let script = match extract_script(&response) {
            Some(script) => script,
            None => {
                tracing::warn!(
                    response_bytes = response.len(),
                    "Refinement response has no code"
                );
                return Err(RefineError::RefinementParseError);
            }
        };

        tracing::info!(script_bytes = script.len(), "Refinement completed");
        return Ok(script);
    }
}

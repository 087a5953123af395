#[cfg(test)]
#[path = "analyzer_test.rs"]
mod tests;

use crate::domain::models::BackendBox;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ExecutionResult;
use crate::domain::models::LlmError;

/// Asks the backend to explain, in prose, why a script failed.
pub struct Analyzer<'a> {
    backend: &'a BackendBox,
    error_tail_lines: usize,
}

impl<'a> Analyzer<'a> {
    pub fn new(backend: &'a BackendBox, error_tail_lines: usize) -> Analyzer<'a> {
        return Analyzer {
            backend,
            error_tail_lines,
        };
    }

    pub async fn analyze(
        &self,
        script: &str,
        result: Option<&ExecutionResult>,
        issues: &[String],
    ) -> Result<String, LlmError> {
        let error_log = match result {
            Some(res) => res.error_log(self.error_tail_lines),
            None => "None, the script was not executed.".to_string(),
        };

        let prompt = BackendPrompt::analyze(script, &error_log, issues);
        let analysis = self.backend.get_completion(&prompt).await?;

        let trimmed = analysis.trim();
        if trimmed.is_empty() {
            return Err(LlmError::MalformedResponse(
                "analysis response is empty".to_string(),
            ));
        }

        return Ok(trimmed.to_string());
    }
}

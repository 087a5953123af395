#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;

use std::time::Duration;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::tail_lines;
use crate::domain::models::ExecutionResult;
use crate::domain::models::ExecutorBox;
use crate::domain::models::ValidationError;

const SYNTAX_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns the output of a failed syntax check into a single issue. Python
/// reports the location as `File "...", line N` above the error message.
fn syntax_issue(result: &ExecutionResult) -> String {
    if result.timed_out {
        return "Syntax check timed out".to_string();
    }

    let output = if result.stderr.trim().is_empty() {
        &result.stdout
    } else {
        &result.stderr
    };

    let line = output.lines().rev().find_map(|line| {
        let (_, rest) = line.split_once(", line ")?;
        let digits = rest
            .chars()
            .take_while(|c| return c.is_ascii_digit())
            .collect::<String>();
        return digits.parse::<u32>().ok();
    });
    let message = tail_lines(output, 1);
    let message = message.trim();

    return match (line, message.is_empty()) {
        (_, true) => "Syntax error".to_string(),
        (Some(line), false) => format!("Syntax error at line {line}: {message}"),
        (None, false) => format!("Syntax error: {message}"),
    };
}

/// Pre-flight checks run before a script is executed: blocked patterns,
/// leftovers from the LLM response and, when a checker is set, syntax.
pub struct CodeValidator {
    enabled: bool,
    blocked_patterns: Vec<String>,
    syntax_checker: Option<ExecutorBox>,
}

impl Default for CodeValidator {
    fn default() -> CodeValidator {
        return CodeValidator::new(
            Config::get(ConfigKey::CodeValidation) != "false",
            &Config::get(ConfigKey::BlockedPatterns),
        );
    }
}

impl CodeValidator {
    /// `blocked_patterns` is a comma separated list.
    pub fn new(enabled: bool, blocked_patterns: &str) -> CodeValidator {
        let blocked_patterns = blocked_patterns
            .split(',')
            .map(|pattern| return pattern.trim().to_string())
            .filter(|pattern| return !pattern.is_empty())
            .collect::<Vec<String>>();

        return CodeValidator {
            enabled,
            blocked_patterns,
            syntax_checker: None,
        };
    }

    /// Compiles every script with `checker` before accepting it. The checker
    /// must exit non zero on a syntax error without running the script.
    pub fn with_syntax_check(mut self, checker: ExecutorBox) -> CodeValidator {
        self.syntax_checker = Some(checker);
        return self;
    }

    pub async fn validate(&self, script: &str) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }

        let mut issues = vec![];

        if script.trim().is_empty() {
            return Err(ValidationError {
                issues: vec!["Script is empty".to_string()],
            });
        }

        for pattern in self.blocked_patterns.iter() {
            if script.contains(pattern.as_str()) {
                tracing::warn!(pattern = %pattern, "Blocked pattern detected");
                issues.push(format!("Potentially dangerous code detected: '{pattern}'"));
            }
        }

        let fence_lines = script
            .lines()
            .filter(|line| return line.trim_start().starts_with("```"))
            .count();
        if fence_lines > 0 {
            issues.push(format!(
                "Markdown code fences left in the script ({fence_lines} lines)"
            ));
        }

        if let Some(issue) = self.check_syntax(script).await {
            issues.push(issue);
        }

        if issues.is_empty() {
            return Ok(());
        }

        return Err(ValidationError { issues });
    }

    async fn check_syntax(&self, script: &str) -> Option<String> {
        let checker = self.syntax_checker.as_ref()?;

        // A checker that can't start is not a verdict on the script. Running
        // it will report the same setup problem.
        let result = match checker.execute(script, SYNTAX_CHECK_TIMEOUT).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "Syntax check could not run, skipping it");
                return None;
            }
        };

        if result.succeeded() {
            return None;
        }

        let issue = syntax_issue(&result);
        tracing::warn!(issue = %issue, "Syntax check failed");
        return Some(issue);
    }
}

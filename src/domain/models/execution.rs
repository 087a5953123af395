#[cfg(test)]
#[path = "execution_test.rs"]
mod tests;

use std::time::Duration;

use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Byte cap applied to every tail on top of the line limit. A single line
/// can be as large as the whole captured output.
pub const MAX_TAIL_BYTES: usize = 8 * 1024;

/// Outcome of running a script once. A failing script is still a successful
/// execution from the executor's point of view, the failure lives in here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// `None` when the process was killed, either by the timeout or a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        return self.exit_code == Some(0) && !self.timed_out;
    }

    pub fn status_line(&self) -> String {
        if self.timed_out {
            return format!("Timed out after {:.1}s", self.duration.as_secs_f64());
        }

        return match self.exit_code {
            Some(code) => format!(
                "Exited with code {code} after {:.1}s",
                self.duration.as_secs_f64()
            ),
            None => "Terminated by a signal".to_string(),
        };
    }

    /// Failure context handed to the LLM. Only the last `max_lines` of each
    /// stream, and at most `MAX_TAIL_BYTES` of them, are kept so repeated fix
    /// attempts can't grow the prompt without bound.
    pub fn error_log(&self, max_lines: usize) -> String {
        let mut sections = vec![self.status_line()];

        let stderr = tail_lines(&self.stderr, max_lines);
        if !stderr.is_empty() {
            sections.push(format!("--- STDERR ---\n{stderr}"));
        }

        let stdout = tail_lines(&self.stdout, max_lines);
        if !stdout.is_empty() {
            sections.push(format!("--- STDOUT ---\n{stdout}"));
        }

        return sections.join("\n\n");
    }
}

pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines = text.trim_end().lines().collect::<Vec<&str>>();
    let start = lines.len().saturating_sub(max_lines);

    return tail_bytes(&lines[start..].join("\n"), MAX_TAIL_BYTES);
}

fn tail_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }

    return format!("...{}", &text[start..]);
}

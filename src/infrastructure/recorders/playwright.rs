#[cfg(test)]
#[path = "playwright_test.rs"]
mod tests;

use std::io;
use std::process::Command;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::tail_lines;
use crate::domain::models::RecordError;
use crate::domain::models::Recorder;
use crate::infrastructure::process;

/// Drives `playwright codegen`, or any command taking the same
/// `-o <file> [url]` arguments, and reads back the script it wrote.
pub struct Playwright {
    program: String,
    args: Vec<String>,
    url: Option<String>,
    timeout: Duration,
}

impl Playwright {
    pub fn new(program: &str, args: Vec<String>, url: Option<String>, timeout: Duration) -> Playwright {
        return Playwright {
            program: program.to_string(),
            args,
            url,
            timeout,
        };
    }

    pub fn from_config(url: Option<String>) -> Result<Playwright> {
        let command = Config::get(ConfigKey::RecorderCommand);
        let mut parts = command.split_whitespace().map(|e| return e.to_string());
        let program = match parts.next() {
            Some(program) => program,
            None => bail!("No recorder command configured, set one with --recorder-command"),
        };

        return Ok(Playwright::new(
            &program,
            parts.collect(),
            url,
            Duration::from_secs(Config::parse::<u64>(ConfigKey::RecordingTimeout)?),
        ));
    }
}

#[async_trait]
impl Recorder for Playwright {
    #[allow(clippy::implicit_return)]
    async fn record(&self) -> Result<String, RecordError> {
        let dir = tempfile::Builder::new()
            .prefix("recast-recording-")
            .tempdir()
            .map_err(|err| {
                return RecordError::RecorderUnavailable(format!(
                    "unable to create a recording directory: {err}"
                ));
            })?;
        let output_path = dir.path().join("recording.py");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg("-o").arg(&output_path);
        if let Some(url) = &self.url {
            cmd.arg(url);
        }

        tracing::info!(program = %self.program, url = ?self.url, "Starting recorder");
        let output = process::run(cmd, self.timeout).await.map_err(|err| {
            return RecordError::RecorderUnavailable(format!(
                "unable to launch '{}': {err}",
                self.program
            ));
        })?;

        if output.timed_out {
            return Err(RecordError::RecordingAborted(format!(
                "the recorder was still open after {}s and was closed",
                self.timeout.as_secs()
            )));
        }

        if output.exit_code != Some(0) {
            let status = output
                .exit_code
                .map(|code| return format!("exited with code {code}"))
                .unwrap_or_else(|| return "was terminated by a signal".to_string());
            let stderr = tail_lines(&output.stderr, 5);
            return Err(RecordError::RecordingAborted(
                format!("the recorder {status}\n{stderr}").trim().to_string(),
            ));
        }

        let mut script = match fs::read_to_string(&output_path).await {
            Ok(script) => script,
            Err(err) if err.kind() == io::ErrorKind::NotFound => "".to_string(),
            Err(err) => {
                return Err(RecordError::RecordingAborted(format!(
                    "unable to read the recording: {err}"
                )));
            }
        };
        if script.trim().is_empty() {
            script = output.stdout;
        }
        if script.trim().is_empty() {
            return Err(RecordError::RecordingAborted(
                "the recorder closed without producing any code".to_string(),
            ));
        }

        tracing::info!(bytes = script.len(), "Recording captured");
        return Ok(script);
    }
}

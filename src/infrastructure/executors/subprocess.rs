#[cfg(test)]
#[path = "subprocess_test.rs"]
mod tests;

use std::io;
use std::io::Write;
use std::process::Command;
use std::time::Duration;

use async_trait::async_trait;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ExecutionResult;
use crate::domain::models::ExecutionSetupError;
use crate::domain::models::Executor;
use crate::infrastructure::process;

fn write_all(file: &mut tempfile::NamedTempFile, script: &str) -> io::Result<()> {
    file.write_all(script.as_bytes())?;
    if !script.ends_with('\n') {
        file.write_all(b"\n")?;
    }

    return file.flush();
}

/// Runs scripts with an interpreter in a child process. Every execution gets
/// its own temp file, removed when the run ends.
pub struct Subprocess {
    interpreter: String,
    extension: String,
}

impl Default for Subprocess {
    fn default() -> Subprocess {
        return Subprocess {
            interpreter: Config::get(ConfigKey::Interpreter),
            extension: Config::get(ConfigKey::ScriptExtension),
        };
    }
}

impl Subprocess {
    pub fn new(interpreter: &str, extension: &str) -> Subprocess {
        return Subprocess {
            interpreter: interpreter.to_string(),
            extension: extension.to_string(),
        };
    }

    fn write_script(&self, script: &str) -> Result<tempfile::NamedTempFile, ExecutionSetupError> {
        let mut file = tempfile::Builder::new()
            .prefix("recast-script-")
            .suffix(&format!(".{}", self.extension))
            .tempfile()
            .map_err(|err| return ExecutionSetupError::new("create a temporary script file", err))?;

        write_all(&mut file, script)
            .map_err(|err| return ExecutionSetupError::new("write the temporary script file", err))?;

        return Ok(file);
    }
}

#[async_trait]
impl Executor for Subprocess {
    #[allow(clippy::implicit_return)]
    async fn execute(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionSetupError> {
        let mut parts = self.interpreter.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            return ExecutionSetupError::new(
                "start the interpreter",
                io::Error::new(io::ErrorKind::InvalidInput, "no interpreter is configured"),
            );
        })?;

        let file = self.write_script(script)?;
        let mut cmd = Command::new(program);
        cmd.args(parts).arg(file.path()).env("PYTHONUNBUFFERED", "1");

        tracing::info!(
            interpreter = %self.interpreter,
            path = ?file.path(),
            timeout_secs = timeout.as_secs_f64(),
            "Executing script"
        );

        let output = process::run(cmd, timeout).await.map_err(|err| {
            return ExecutionSetupError::new(&format!("run '{}'", self.interpreter), err);
        })?;

        if let Err(err) = file.close() {
            tracing::warn!(error = %err, "Failed to remove temporary script file");
        }

        let result = ExecutionResult {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            timed_out: output.timed_out,
            duration: output.duration,
        };
        tracing::info!(
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            duration_secs = result.duration.as_secs_f64(),
            "Script finished"
        );

        return Ok(result);
    }
}

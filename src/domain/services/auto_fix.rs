#[cfg(test)]
#[path = "auto_fix_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::extract_script;
use super::CodeValidator;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AttemptOutcome;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ExecutionResult;
use crate::domain::models::ExecutionSetupError;
use crate::domain::models::ExecutorBox;
use crate::domain::models::FixAttempt;
use crate::domain::models::FixAttemptError;
use crate::domain::models::Session;
use crate::domain::models::SessionStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum FixState {
    Idle,
    Running,
    Fixing,
    Succeeded,
    Exhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum StopReason {
    /// Every allowed fix attempt was used and the script still fails.
    AttemptsExhausted,
    /// The LLM returned the script it was asked to fix, unchanged.
    Stagnated,
}

#[derive(Clone, Debug)]
pub struct AutoFixSettings {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub error_tail_lines: usize,
}

impl Default for AutoFixSettings {
    fn default() -> AutoFixSettings {
        return AutoFixSettings {
            max_attempts: 3,
            timeout: Duration::from_secs(60),
            error_tail_lines: 40,
        };
    }
}

impl AutoFixSettings {
    pub fn from_config() -> Result<AutoFixSettings> {
        return Ok(AutoFixSettings {
            max_attempts: Config::parse::<u32>(ConfigKey::MaxFixAttempts)?,
            timeout: Duration::from_secs(Config::parse::<u64>(ConfigKey::ExecutionTimeout)?),
            error_tail_lines: Config::parse::<usize>(ConfigKey::ErrorTailLines)?,
        });
    }
}

/// Terminal outcome of the auto-fix loop. On `Exhausted` the session holds
/// the last attempted script and the result of its last execution.
#[derive(Debug)]
pub struct FixReport {
    pub state: FixState,
    pub stop_reason: Option<StopReason>,
    pub session: Session,
}

impl FixReport {
    pub fn succeeded(&self) -> bool {
        return self.state == FixState::Succeeded;
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        return self.session.last_result.as_ref();
    }
}

/// Guard for leaving `Running`.
pub fn next_state(result: &ExecutionResult, attempt_count: u32, max_attempts: u32) -> FixState {
    if result.succeeded() {
        return FixState::Succeeded;
    }
    if attempt_count < max_attempts {
        return FixState::Fixing;
    }

    return FixState::Exhausted;
}

fn is_stagnant(candidate: &str, current: &str) -> bool {
    return candidate.trim() == current.trim();
}

/// Runs a script, and on every failure asks the backend for a fix and runs
/// the fixed script again, until it succeeds or the attempt budget is spent.
/// With a validator set, a fix that fails validation is never run.
pub struct AutoFix<'a> {
    backend: &'a BackendBox,
    executor: &'a ExecutorBox,
    validator: Option<&'a CodeValidator>,
    settings: AutoFixSettings,
}

impl<'a> AutoFix<'a> {
    pub fn new(
        backend: &'a BackendBox,
        executor: &'a ExecutorBox,
        settings: AutoFixSettings,
    ) -> AutoFix<'a> {
        return AutoFix {
            backend,
            executor,
            validator: None,
            settings,
        };
    }

    pub fn with_validator(mut self, validator: &'a CodeValidator) -> AutoFix<'a> {
        self.validator = Some(validator);
        return self;
    }

    /// Drives `session` to `Succeeded` or `Exhausted`. Only a failure to start
    /// the script at all aborts the loop early.
    pub async fn run(&self, mut session: Session) -> Result<FixReport, ExecutionSetupError> {
        let mut state = FixState::Idle;
        let mut stop_reason = None;
        let mut pending_attempt: Option<u32> = None;
        let mut rejection: Option<String> = None;

        loop {
            tracing::debug!(
                session_id = %session.id,
                state = %state,
                attempt = session.attempt_count,
                "Auto-fix state"
            );

            state = match state {
                FixState::Idle => FixState::Running,
                FixState::Running => {
                    session.status = SessionStatus::Running;
                    let result = self
                        .executor
                        .execute(&session.current_script, self.settings.timeout)
                        .await?;

                    if let Some(number) = pending_attempt.take() {
                        session.attempts.push(FixAttempt {
                            number,
                            outcome: AttemptOutcome::Executed(result.clone()),
                        });
                    }

                    let next = next_state(
                        &result,
                        session.attempt_count,
                        self.settings.max_attempts,
                    );
                    if next == FixState::Exhausted {
                        stop_reason = Some(StopReason::AttemptsExhausted);
                    }

                    tracing::info!(
                        session_id = %session.id,
                        exit_code = ?result.exit_code,
                        timed_out = result.timed_out,
                        duration_ms = result.duration.as_millis() as u64,
                        "Script executed"
                    );
                    session.last_result = Some(result);
                    next
                }
                FixState::Fixing => {
                    session.status = SessionStatus::Fixing;
                    session.attempt_count += 1;
                    let number = session.attempt_count;

                    match self.request_fix(&session, rejection.take()).await {
                        Ok(script) if is_stagnant(&script, &session.current_script) => {
                            tracing::warn!(
                                session_id = %session.id,
                                attempt = number,
                                "Fix returned the script unchanged, giving up"
                            );
                            session.attempts.push(FixAttempt {
                                number,
                                outcome: AttemptOutcome::Stagnated,
                            });
                            stop_reason = Some(StopReason::Stagnated);
                            FixState::Exhausted
                        }
                        Ok(script) => {
                            session.current_script = script;
                            pending_attempt = Some(number);
                            FixState::Running
                        }
                        Err(err) => {
                            tracing::warn!(
                                session_id = %session.id,
                                attempt = number,
                                error = %err,
                                "Fix attempt failed"
                            );
                            session.attempts.push(FixAttempt {
                                number,
                                outcome: AttemptOutcome::FixAttemptFailed(err.to_string()),
                            });
                            if let FixAttemptError::Rejected(validation) = &err {
                                rejection = Some(validation.to_string());
                            }

                            if number < self.settings.max_attempts {
                                FixState::Fixing
                            } else {
                                stop_reason = Some(StopReason::AttemptsExhausted);
                                FixState::Exhausted
                            }
                        }
                    }
                }
                FixState::Succeeded | FixState::Exhausted => break,
            };
        }

        if state == FixState::Succeeded {
            session.status = SessionStatus::Succeeded;
        } else {
            session.status = SessionStatus::Failed;
        }

        tracing::info!(
            session_id = %session.id,
            state = %state,
            attempts = session.attempt_count,
            "Auto-fix finished"
        );

        return Ok(FixReport {
            state,
            stop_reason,
            session,
        });
    }

    /// Asks for a fix of the current script. `rejection` explains why the
    /// previous fix was refused, so the backend doesn't send it again.
    async fn request_fix(
        &self,
        session: &Session,
        rejection: Option<String>,
    ) -> Result<String, FixAttemptError> {
        let mut error_log = session
            .last_result
            .as_ref()
            .map(|result| return result.error_log(self.settings.error_tail_lines))
            .unwrap_or_default();
        if let Some(rejection) = rejection {
            error_log = format!(
                "{error_log}\n\n--- REJECTED FIX ---\nThe previous fix was not run, {rejection}"
            );
        }

        let prompt = BackendPrompt::fix(&session.current_script, &error_log);
        let response = self.backend.get_completion(&prompt).await?;
        let script = extract_script(&response).ok_or(FixAttemptError::EmptyResponse)?;

        if let Some(validator) = self.validator {
            validator.validate(&script).await?;
        }

        return Ok(script);
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;

use anyhow::Result;

use super::AutoFix;
use super::AutoFixSettings;
use super::CodeValidator;
use super::FixReport;
use super::Refiner;
use super::RetryPolicy;
use super::Sessions;
use crate::domain::models::BackendBox;
use crate::domain::models::ExecutorBox;
use crate::domain::models::Session;
use crate::domain::models::SessionStatus;

/// Refines a raw recording, validates the result and hands it to the
/// auto-fix loop, which validates every fix the same way. Every session that gets past recording is saved, including
/// the ones that fail before running.
pub struct Pipeline<'a> {
    backend: &'a BackendBox,
    executor: &'a ExecutorBox,
    retry: RetryPolicy,
    validator: CodeValidator,
    settings: AutoFixSettings,
    sessions: Sessions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        backend: &'a BackendBox,
        executor: &'a ExecutorBox,
        retry: RetryPolicy,
        validator: CodeValidator,
        settings: AutoFixSettings,
        sessions: Sessions,
    ) -> Pipeline<'a> {
        return Pipeline {
            backend,
            executor,
            retry,
            validator,
            settings,
            sessions,
        };
    }

    pub async fn run(&self, raw_script: &str, task: &str) -> Result<FixReport> {
        let mut session = Session::new(&Sessions::create_id(), task, raw_script);
        session.status = SessionStatus::Refining;
        tracing::info!(session_id = %session.id, "Pipeline started");

        let refiner = Refiner::new(self.backend);
        let refined = self
            .retry
            .run("refine", || return refiner.refine(raw_script, task))
            .await;

        session.current_script = match refined {
            Ok(script) => script,
            Err(err) => {
                self.save_failed(session).await?;
                return Err(err.into());
            }
        };

        if let Err(err) = self.validator.validate(&session.current_script).await {
            self.save_failed(session).await?;
            return Err(err.into());
        }

        let report = AutoFix::new(self.backend, self.executor, self.settings.clone())
            .with_validator(&self.validator)
            .run(session)
            .await?;
        self.sessions.save(&report.session).await?;

        return Ok(report);
    }

    async fn save_failed(&self, mut session: Session) -> Result<()> {
        tracing::warn!(session_id = %session.id, status = %session.status, "Pipeline stopped before running");
        session.status = SessionStatus::Failed;
        return self.sessions.save(&session).await;
    }
}

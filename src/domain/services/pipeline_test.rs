use std::time::Duration;

use anyhow::Result;

use super::Pipeline;
use crate::domain::models::BackendBox;
use crate::domain::models::ExecutorBox;
use crate::domain::models::LlmError;
use crate::domain::models::RefineError;
use crate::domain::models::SessionStatus;
use crate::domain::models::ValidationError;
use crate::domain::services::fakes::ScriptedBackend;
use crate::domain::services::fakes::ScriptedExecutor;
use crate::domain::services::AutoFixSettings;
use crate::domain::services::CodeValidator;
use crate::domain::services::FixReport;
use crate::domain::services::FixState;
use crate::domain::services::RetryPolicy;
use crate::domain::services::Sessions;

struct Harness {
    _dir: tempfile::TempDir,
    sessions_dir: std::path::PathBuf,
    backend: ScriptedBackend,
    executor: ScriptedExecutor,
}

impl Harness {
    fn new(responses: Vec<Result<String, LlmError>>) -> Result<Harness> {
        let dir = tempfile::tempdir()?;
        return Ok(Harness {
            sessions_dir: dir.path().join("sessions"),
            _dir: dir,
            backend: ScriptedBackend::new(responses),
            executor: ScriptedExecutor::default(),
        });
    }

    fn sessions(&self) -> Sessions {
        return Sessions::new(self.sessions_dir.clone());
    }

    async fn run(&self, raw_script: &str) -> Result<FixReport> {
        let backend: BackendBox = Box::new(self.backend.clone());
        let executor: ExecutorBox = Box::new(self.executor.clone());
        let pipeline = Pipeline::new(
            &backend,
            &executor,
            RetryPolicy {
                attempts: 2,
                base_delay: Duration::from_millis(1),
            },
            CodeValidator::new(true, "os.system"),
            AutoFixSettings {
                max_attempts: 2,
                timeout: Duration::from_secs(1),
                error_tail_lines: 10,
            },
            self.sessions(),
        );

        return pipeline.run(raw_script, "Print a greeting").await;
    }
}

#[tokio::test]
async fn it_refines_runs_and_saves_the_session() -> Result<()> {
    let harness = Harness::new(vec![Ok("```python\nprint('Hello')\n```".to_string())])?;
    let report = harness.run("page.click('#x')").await?;

    assert_eq!(report.state, FixState::Succeeded);
    assert_eq!(report.session.raw_script(), "page.click('#x')");
    assert_eq!(report.session.current_script, "print('Hello')");
    assert_eq!(harness.executor.scripts(), vec!["print('Hello')".to_string()]);

    let saved = harness.sessions().load(&report.session.id).await?;
    assert_eq!(saved.status, SessionStatus::Succeeded);
    return Ok(());
}

#[tokio::test]
async fn it_fixes_refined_scripts_that_fail() -> Result<()> {
    let harness = Harness::new(vec![
        Ok("print(greeting) # fail".to_string()),
        Ok("greeting = 'hi'\nprint(greeting)".to_string()),
    ])?;
    let report = harness.run("raw").await?;

    assert!(report.succeeded());
    assert_eq!(report.session.attempt_count, 1);
    assert_eq!(harness.backend.calls(), 2);
    return Ok(());
}

#[tokio::test]
async fn it_retries_refinement_after_network_errors() -> Result<()> {
    let harness = Harness::new(vec![
        Err(LlmError::Network("connection reset".to_string())),
        Ok("print('Hello')".to_string()),
    ])?;
    let report = harness.run("raw").await?;

    assert!(report.succeeded());
    assert_eq!(harness.backend.calls(), 2);
    return Ok(());
}

#[tokio::test]
async fn it_does_not_retry_auth_errors() -> Result<()> {
    let harness = Harness::new(vec![
        Err(LlmError::Auth("bad key".to_string())),
        Ok("print('Hello')".to_string()),
    ])?;
    let err = harness.run("raw").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RefineError>(),
        Some(RefineError::LlmCallFailed(LlmError::Auth(_)))
    ));
    assert_eq!(harness.backend.calls(), 1);
    assert_eq!(harness.executor.runs(), 0);

    let saved = harness.sessions().list().await?;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].status, SessionStatus::Failed);
    return Ok(());
}

#[tokio::test]
async fn it_refuses_to_run_scripts_that_fail_validation() -> Result<()> {
    let harness = Harness::new(vec![Ok("import os\nos.system('rm -rf /')".to_string())])?;
    let err = harness.run("raw").await.unwrap_err();

    let validation = err.downcast_ref::<ValidationError>().unwrap();
    assert_eq!(
        validation.issues,
        vec!["Potentially dangerous code detected: 'os.system'".to_string()]
    );
    assert_eq!(harness.executor.runs(), 0);

    let saved = harness.sessions().list().await?;
    assert_eq!(saved[0].status, SessionStatus::Failed);
    assert_eq!(saved[0].current_script, "import os\nos.system('rm -rf /')");
    return Ok(());
}

#[tokio::test]
async fn it_never_runs_fixes_that_fail_validation() -> Result<()> {
    let harness = Harness::new(vec![
        Ok("print(greeting) # fail".to_string()),
        Ok("import os\nos.system('rm -rf ~')".to_string()),
    ])?;
    let report = harness.run("raw").await?;

    assert_eq!(report.state, FixState::Exhausted);
    assert_eq!(
        harness.executor.scripts(),
        vec!["print(greeting) # fail".to_string()]
    );
    assert_eq!(report.session.current_script, "print(greeting) # fail");

    let saved = harness.sessions().load(&report.session.id).await?;
    assert_eq!(saved.status, SessionStatus::Failed);
    return Ok(());
}

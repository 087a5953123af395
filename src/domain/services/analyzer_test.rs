use std::time::Duration;

use anyhow::Result;

use super::Analyzer;
use crate::domain::models::BackendBox;
use crate::domain::models::ExecutionResult;
use crate::domain::models::LlmError;
use crate::domain::services::fakes::ScriptedBackend;

fn failed_result() -> ExecutionResult {
    return ExecutionResult {
        exit_code: Some(1),
        stdout: "".to_string(),
        stderr: "TimeoutError: Locator.click: Timeout 30000ms exceeded.".to_string(),
        timed_out: false,
        duration: Duration::from_secs(31),
    };
}

#[tokio::test]
async fn it_analyzes_a_failed_run() -> Result<()> {
    let scripted = ScriptedBackend::new(vec![Ok(
        "\nThe selector no longer matches.\n".to_string(),
    )]);
    let backend: BackendBox = Box::new(scripted.clone());

    let res = Analyzer::new(&backend, 10)
        .analyze("page.click('#go')", Some(&failed_result()), &[])
        .await?;

    assert_eq!(res, "The selector no longer matches.");
    let prompts = scripted.prompts();
    assert!(prompts[0].text.contains("TimeoutError: Locator.click"));
    return Ok(());
}

#[tokio::test]
async fn it_analyzes_validation_issues_without_a_run() -> Result<()> {
    let scripted = ScriptedBackend::new(vec![Ok("Remove the subprocess call.".to_string())]);
    let backend: BackendBox = Box::new(scripted.clone());

    Analyzer::new(&backend, 10)
        .analyze(
            "import subprocess",
            None,
            &["Potentially dangerous code detected: 'subprocess'".to_string()],
        )
        .await?;

    let prompt = &scripted.prompts()[0];
    assert!(prompt.text.contains("the script was not executed"));
    assert!(prompt.text.contains("- Potentially dangerous code detected"));
    return Ok(());
}

#[tokio::test]
async fn it_rejects_empty_analysis() {
    let backend: BackendBox = Box::new(ScriptedBackend::new(vec![Ok(" \n".to_string())]));

    let res = Analyzer::new(&backend, 10)
        .analyze("print(1)", Some(&failed_result()), &[])
        .await;

    assert!(matches!(res, Err(LlmError::MalformedResponse(_))));
}

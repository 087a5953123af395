#[cfg(test)]
#[path = "commands_test.rs"]
mod tests;

use std::path;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use tokio::fs;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AttemptOutcome;
use crate::domain::models::BackendBox;
use crate::domain::models::ExecutionResult;
use crate::domain::models::LlmError;
use crate::domain::models::ProviderName;
use crate::domain::models::Session;
use crate::domain::services::Analyzer;
use crate::domain::services::AutoFix;
use crate::domain::services::AutoFixSettings;
use crate::domain::services::CodeValidator;
use crate::domain::services::FixReport;
use crate::domain::services::Pipeline;
use crate::domain::services::Refiner;
use crate::domain::services::RetryPolicy;
use crate::domain::services::Sessions;
use crate::domain::services::StopReason;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::executors::ExecutorManager;
use crate::infrastructure::recorders::RecorderManager;

fn status(msg: &str) {
    eprintln!("{}", Paint::cyan(msg));
}

fn backend() -> Result<BackendBox> {
    let name = Config::get(ConfigKey::Provider);
    let provider = match ProviderName::parse(name.to_string()) {
        Some(provider) => provider,
        None => bail!(format!("No provider named '{name}'")),
    };

    return BackendManager::get(provider);
}

fn validator() -> CodeValidator {
    let validator = CodeValidator::default();
    return match ExecutorManager::syntax_checker() {
        Some(checker) => validator.with_syntax_check(checker),
        None => validator,
    };
}

fn execution_timeout() -> Result<Duration> {
    return Ok(Duration::from_secs(Config::parse::<u64>(
        ConfigKey::ExecutionTimeout,
    )?));
}

async fn read_script(input: &str) -> Result<String> {
    return fs::read_to_string(input)
        .await
        .map_err(|err| return anyhow!("Failed to read script from {input}: {err}"));
}

async fn write_script(output: Option<String>, script: &str) -> Result<()> {
    let output = match output {
        Some(output) => output,
        None => {
            println!("{}", script.trim_end());
            return Ok(());
        }
    };

    if let Some(parent) = path::Path::new(&output).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut contents = script.to_string();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    fs::write(&output, contents)
        .await
        .map_err(|err| return anyhow!("Failed to write script to {output}: {err}"))?;

    status(&format!("Saved script to {output}"));
    return Ok(());
}

/// Hint printed below an error, for failures the user can fix themselves.
pub fn error_hint(err: &anyhow::Error) -> Option<&'static str> {
    let is_auth = err.chain().any(|cause| {
        return matches!(cause.downcast_ref::<LlmError>(), Some(LlmError::Auth(_)));
    });
    if is_auth {
        return Some("Check your API key. Set it with --api-key, RECAST_API_KEY, or the provider's own variable such as OPENAI_API_KEY.");
    }

    return None;
}

pub fn format_result(result: &ExecutionResult) -> String {
    let mut sections = vec![];
    if result.succeeded() {
        sections.push(Paint::green(result.status_line()).to_string());
    } else {
        sections.push(Paint::red(result.status_line()).to_string());
    }

    if !result.stdout.trim().is_empty() {
        sections.push(format!("--- STDOUT ---\n{}", result.stdout.trim_end()));
    }
    if !result.stderr.trim().is_empty() {
        sections.push(format!("--- STDERR ---\n{}", result.stderr.trim_end()));
    }

    return sections.join("\n\n");
}

pub fn format_attempts(session: &Session) -> String {
    return session
        .attempts
        .iter()
        .map(|attempt| {
            let outcome = match &attempt.outcome {
                AttemptOutcome::Executed(result) => result.status_line(),
                AttemptOutcome::FixAttemptFailed(reason) => format!("Fix failed: {reason}"),
                AttemptOutcome::Stagnated => "Returned the script unchanged".to_string(),
            };
            return format!("  {}. {outcome}", attempt.number);
        })
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn summarize(report: &FixReport) -> String {
    let session = &report.session;
    let headline = match (report.succeeded(), report.stop_reason) {
        (true, _) if session.attempt_count == 0 => "Script ran successfully.".to_string(),
        (true, _) => format!(
            "Script ran successfully after {} fix attempt(s).",
            session.attempt_count
        ),
        (false, Some(StopReason::Stagnated)) => format!(
            "Giving up after {} fix attempt(s), the last fix did not change the script.",
            session.attempt_count
        ),
        (false, _) => format!(
            "Giving up after {} fix attempt(s), the script still fails.",
            session.attempt_count
        ),
    };

    let mut sections = vec![headline];
    if !session.attempts.is_empty() {
        sections.push(format!("Attempts:\n{}", format_attempts(session)));
    }

    return sections.join("\n");
}

async fn finish(report: FixReport, output: Option<String>) -> Result<bool> {
    if let Some(result) = report.last_result() {
        eprintln!("{}\n", format_result(result));
    }

    if report.succeeded() {
        eprintln!("{}", Paint::green(summarize(&report)));
    } else {
        eprintln!("{}", Paint::red(summarize(&report)));
    }

    write_script(output, &report.session.current_script).await?;
    status(&format!(
        "Session {} saved, run `recast sessions show -i {}` to see it again.",
        report.session.id, report.session.id
    ));

    return Ok(report.succeeded());
}

pub async fn record(url: Option<String>, output: Option<String>) -> Result<()> {
    let recorder = RecorderManager::get(url)?;
    status("Recording, close the browser window when you're done.");

    let script = recorder.record().await?;
    write_script(output, &script).await?;

    return Ok(());
}

pub async fn refine(task: &str, input: &str, output: Option<String>) -> Result<()> {
    let raw_script = read_script(input).await?;
    let backend = backend()?;
    let refiner = Refiner::new(&backend);

    status(&format!("Refining {input} with {}", backend.name()));
    let script = RetryPolicy::from_config()?
        .run("refine", || return refiner.refine(&raw_script, task))
        .await?;

    write_script(output, &script).await?;
    return Ok(());
}

pub async fn run(input: &str) -> Result<bool> {
    let script = read_script(input).await?;
    validator().validate(&script).await?;

    let executor = ExecutorManager::get();
    let result = executor.execute(&script, execution_timeout()?).await?;
    println!("{}", format_result(&result));

    return Ok(result.succeeded());
}

pub async fn fix(input: &str, task: Option<String>, output: Option<String>) -> Result<bool> {
    let script = read_script(input).await?;
    let backend = backend()?;
    let executor = ExecutorManager::get();

    let validator = validator();
    validator.validate(&script).await?;

    let session = Session::from_script(
        &Sessions::create_id(),
        &task.unwrap_or_default(),
        &script,
    );
    status(&format!("Running {input}"));
    let report = AutoFix::new(&backend, &executor, AutoFixSettings::from_config()?)
        .with_validator(&validator)
        .run(session)
        .await?;
    Sessions::default().save(&report.session).await?;

    return finish(report, output).await;
}

pub async fn analyze(input: &str) -> Result<bool> {
    let script = read_script(input).await?;
    let backend = backend()?;

    let issues = match validator().validate(&script).await {
        Ok(_) => vec![],
        Err(err) => err.issues,
    };

    // Scripts that fail validation are analyzed without running them.
    let mut result = None;
    if issues.is_empty() {
        let executor = ExecutorManager::get();
        let res = executor.execute(&script, execution_timeout()?).await?;
        eprintln!("{}\n", format_result(&res));
        result = Some(res);
    }

    if issues.is_empty() && result.as_ref().map(|res| return res.succeeded()) == Some(true) {
        status("Script ran successfully, nothing to analyze.");
        return Ok(true);
    }

    let analyzer = Analyzer::new(&backend, Config::parse::<usize>(ConfigKey::ErrorTailLines)?);
    status(&format!("Analyzing {input} with {}", backend.name()));
    let analysis = RetryPolicy::from_config()?
        .run("analyze", || {
            return analyzer.analyze(&script, result.as_ref(), &issues);
        })
        .await?;

    println!("{analysis}");
    return Ok(false);
}

pub async fn pipeline(
    task: &str,
    url: Option<String>,
    raw: Option<String>,
    output: Option<String>,
) -> Result<bool> {
    let raw_script = match raw {
        Some(raw) => read_script(&raw).await?,
        None => {
            let recorder = RecorderManager::get(url)?;
            status("Recording, close the browser window when you're done.");
            recorder.record().await?
        }
    };

    let backend = backend()?;
    let executor = ExecutorManager::get();
    let pipeline = Pipeline::new(
        &backend,
        &executor,
        RetryPolicy::from_config()?,
        validator(),
        AutoFixSettings::from_config()?,
        Sessions::default(),
    );

    status(&format!("Refining the recording with {}", backend.name()));
    let report = pipeline.run(&raw_script, task).await?;

    return finish(report, output).await;
}

pub async fn check() -> Result<()> {
    let backend = backend()?;
    backend.health_check().await?;
    println!(
        "{}",
        Paint::green(format!("{} is configured and reachable.", backend.name()))
    );

    return Ok(());
}

pub async fn show_session(id: &str) -> Result<()> {
    let session = Sessions::default().load(id).await?;

    println!("ID: {}", session.id);
    println!("Created: {}", session.timestamp);
    println!("Status: {}", session.status);
    if !session.task.is_empty() {
        println!("Task: {}", session.task);
    }
    println!("Fix attempts: {}", session.attempt_count);
    if !session.attempts.is_empty() {
        println!("{}", format_attempts(&session));
    }
    if let Some(result) = &session.last_result {
        println!("\n{}", format_result(result));
    }
    if session.raw_script() != session.current_script {
        println!("\n--- RECORDED ---\n{}", session.raw_script().trim_end());
    }
    println!("\n--- SCRIPT ---\n{}", session.current_script.trim_end());

    return Ok(());
}

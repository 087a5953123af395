use std::process::Command;
use std::time::Duration;

use anyhow::Result;

use super::run;

fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    return cmd;
}

#[tokio::test]
async fn it_captures_output_and_exit_code() -> Result<()> {
    let res = run(sh("echo out; echo err >&2; exit 3"), Duration::from_secs(5)).await?;

    assert_eq!(res.exit_code, Some(3));
    assert_eq!(res.stdout, "out\n");
    assert_eq!(res.stderr, "err\n");
    assert!(!res.timed_out);
    return Ok(());
}

#[tokio::test]
async fn it_kills_processes_that_run_too_long() -> Result<()> {
    let res = run(
        sh("echo started; while :; do :; done"),
        Duration::from_millis(300),
    )
    .await?;

    assert!(res.timed_out);
    assert_eq!(res.exit_code, None);
    assert_eq!(res.stdout, "started\n");
    assert!(res.duration < Duration::from_secs(3));
    return Ok(());
}

#[tokio::test]
async fn it_kills_children_of_processes_that_run_too_long() -> Result<()> {
    let res = run(
        sh("echo started; sleep 30; echo done"),
        Duration::from_millis(500),
    )
    .await?;

    assert!(res.timed_out);
    assert_eq!(res.stdout, "started\n");
    assert!(res.duration < Duration::from_secs(2));
    return Ok(());
}

#[tokio::test]
async fn it_does_not_wait_for_background_children() -> Result<()> {
    let start = std::time::Instant::now();
    let res = run(sh("echo hi; sleep 30 &"), Duration::from_secs(10)).await?;

    assert_eq!(res.exit_code, Some(0));
    assert_eq!(res.stdout, "hi\n");
    assert!(start.elapsed() < Duration::from_secs(3));
    return Ok(());
}

#[tokio::test]
async fn it_decodes_invalid_utf8_lossily() -> Result<()> {
    let res = run(sh("printf 'caf\\351'"), Duration::from_secs(5)).await?;

    assert_eq!(res.stdout, "caf\u{FFFD}");
    return Ok(());
}

#[tokio::test]
async fn it_fails_to_spawn_missing_programs() {
    let res = run(
        Command::new("recast-definitely-not-installed"),
        Duration::from_secs(1),
    )
    .await;

    assert_eq!(res.unwrap_err().kind(), std::io::ErrorKind::NotFound);
}

use std::time::Duration;

use super::tail_lines;
use super::ExecutionResult;
use super::MAX_TAIL_BYTES;

fn result(exit_code: Option<i32>, stderr: &str, timed_out: bool) -> ExecutionResult {
    return ExecutionResult {
        exit_code,
        stdout: "".to_string(),
        stderr: stderr.to_string(),
        timed_out,
        duration: Duration::from_millis(1500),
    };
}

#[test]
fn it_succeeds_only_on_zero_exit() {
    assert!(result(Some(0), "", false).succeeded());
    assert!(!result(Some(1), "boom", false).succeeded());
    assert!(!result(None, "", true).succeeded());
    assert!(!result(None, "", false).succeeded());
}

#[test]
fn it_keeps_the_tail_of_long_output() {
    let text = (1..=10)
        .map(|n| return format!("line {n}"))
        .collect::<Vec<String>>()
        .join("\n");

    insta::assert_snapshot!(tail_lines(&text, 3), @r###"
    line 8
    line 9
    line 10
    "###);
    assert_eq!(tail_lines(&text, 50).lines().count(), 10);
    assert_eq!(tail_lines("", 5), "");
}

#[test]
fn it_builds_a_bounded_error_log() {
    let mut res = result(Some(1), "Traceback\n  File \"a.py\"\nNameError: name 'x' is not defined\n", false);
    res.stdout = "starting\n".to_string();

    insta::assert_snapshot!(res.error_log(2), @r###"
    Exited with code 1 after 1.5s

    --- STDERR ---
      File "a.py"
    NameError: name 'x' is not defined

    --- STDOUT ---
    starting
    "###);
}

#[test]
fn it_reports_timeouts_in_the_error_log() {
    let res = result(None, "", true);
    assert_eq!(res.error_log(10), "Timed out after 1.5s");
}

#[test]
fn it_caps_a_single_oversized_line() {
    let line = format!("Error: {}", "é".repeat(MAX_TAIL_BYTES));
    let tail = tail_lines(&line, 40);

    assert!(tail.starts_with("..."));
    assert!(tail.ends_with('é'));
    assert!(tail.len() <= MAX_TAIL_BYTES + 3);
}

#[test]
fn it_bounds_the_error_log_by_size() {
    let mut res = result(Some(1), &"x".repeat(1024 * 1024), false);
    res.stdout = "y".repeat(1024 * 1024);

    let log = res.error_log(40);
    assert!(log.len() < 2 * MAX_TAIL_BYTES + 100);
    assert!(log.contains("--- STDERR ---\n...xxx"));
    assert!(log.contains("--- STDOUT ---\n...yyy"));
}

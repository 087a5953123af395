#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use chrono::Local;
use chrono::SecondsFormat;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::ExecutionResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SessionStatus {
    Recording,
    Refining,
    Running,
    Fixing,
    Succeeded,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// The fixed script was executed with this result.
    Executed(ExecutionResult),
    /// The LLM call failed or returned nothing usable.
    FixAttemptFailed(String),
    /// The LLM returned the script unchanged.
    Stagnated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixAttempt {
    pub number: u32,
    pub outcome: AttemptOutcome,
}

/// One record, refine, run cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub version: String,
    pub timestamp: String,
    pub task: String,
    raw_script: String,
    pub current_script: String,
    pub attempt_count: u32,
    pub status: SessionStatus,
    pub attempts: Vec<FixAttempt>,
    pub last_result: Option<ExecutionResult>,
}

impl Session {
    pub fn new(id: &str, task: &str, raw_script: &str) -> Session {
        return Session {
            id: id.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            task: task.to_string(),
            raw_script: raw_script.to_string(),
            current_script: raw_script.to_string(),
            attempt_count: 0,
            status: SessionStatus::Recording,
            attempts: vec![],
            last_result: None,
        };
    }

    /// A session for a script that already exists. Nothing is recorded, so it
    /// starts out running.
    pub fn from_script(id: &str, task: &str, script: &str) -> Session {
        let mut session = Session::new(id, task, script);
        session.status = SessionStatus::Running;
        return session;
    }

    /// The script as captured from the recorder. It never changes after the
    /// session is created.
    pub fn raw_script(&self) -> &str {
        return &self.raw_script;
    }
}

pub mod subprocess;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ExecutorBox;

pub struct ExecutorManager {}

impl ExecutorManager {
    pub fn get() -> ExecutorBox {
        return Box::<subprocess::Subprocess>::default();
    }

    /// Runs the configured syntax check command on a script file. `None` when
    /// the command is empty.
    pub fn syntax_checker() -> Option<ExecutorBox> {
        let command = Config::get(ConfigKey::SyntaxCheck);
        if command.trim().is_empty() {
            return None;
        }

        return Some(Box::new(subprocess::Subprocess::new(
            &command,
            &Config::get(ConfigKey::ScriptExtension),
        )));
    }
}

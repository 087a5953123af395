#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;
use std::str::FromStr;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::models::ProviderName;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    Provider,
    Model,
    BaseUrl,
    ApiKey,
    LlmTimeout,
    LlmRetries,
    LlmRetryDelay,
    ExecutionTimeout,
    MaxFixAttempts,
    ErrorTailLines,
    Interpreter,
    ScriptExtension,
    RecorderCommand,
    RecordingTimeout,
    CodeValidation,
    BlockedPatterns,
    SyntaxCheck,
    ConfigFile,
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    /// Same as `get`, falling back to `fallback` when the key is unset or
    /// empty.
    pub fn get_or(key: ConfigKey, fallback: &str) -> String {
        let val = Config::get(key);
        if val.is_empty() {
            return fallback.to_string();
        }

        return val;
    }

    pub fn parse<T>(key: ConfigKey) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let val = Config::get(key);
        return val
            .trim()
            .parse::<T>()
            .map_err(|err| return anyhow!("Invalid value '{val}' for '{key}': {err}"));
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let default_provider = ProviderName::default().to_string();

        #[cfg(not(target_os = "macos"))]
        let config_path = dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("recast/config.toml");
        #[cfg(target_os = "macos")]
        let config_path = path::PathBuf::from(env::var("HOME").unwrap_or_default())
            .join(".config/recast/config.toml");

        let res = match key {
            ConfigKey::Provider => &default_provider,
            ConfigKey::Model => "",
            ConfigKey::BaseUrl => "",
            ConfigKey::ApiKey => "",
            ConfigKey::LlmTimeout => "60",
            ConfigKey::LlmRetries => "3",
            ConfigKey::LlmRetryDelay => "1000",
            ConfigKey::ExecutionTimeout => "60",
            ConfigKey::MaxFixAttempts => "3",
            ConfigKey::ErrorTailLines => "40",
            ConfigKey::Interpreter => "python3",
            ConfigKey::ScriptExtension => "py",
            ConfigKey::RecorderCommand => "playwright codegen",
            ConfigKey::RecordingTimeout => "600",
            ConfigKey::CodeValidation => "true",
            ConfigKey::BlockedPatterns => "subprocess,os.system,shutil.rmtree,eval(,exec(",
            ConfigKey::SyntaxCheck => "python3 -m py_compile",

            // Special
            ConfigKey::ConfigFile => &config_path.to_string_lossy(),
        };

        return res.to_string();
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if let Some(val) = doc.get(&key.to_string()) {
                    // Use clap value parsers to do validation.
                    let mut possible_values = vec![];
                    if let Some(arg) = cmd
                        .get_arguments()
                        .find(|e| return e.get_long() == Some(key.to_string().as_str()))
                    {
                        if !arg.get_possible_values().is_empty() {
                            possible_values = arg
                                .get_possible_values()
                                .iter()
                                .map(|e| return e.get_name().to_string())
                                .collect::<Vec<String>>();
                        }
                    }

                    if let Some(val_int) = val.as_integer() {
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_bool) = val.as_bool() {
                        Config::set(key, &val_bool.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        if !possible_values.is_empty()
                            && !possible_values.contains(&val_str.to_string())
                        {
                            bail!(format!("config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}", possible_values.join(", ")));
                        }
                        Config::set(key, val_str);
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            provider = Config::get(ConfigKey::Provider),
            model = Config::get(ConfigKey::Model),
            base_url = Config::get(ConfigKey::BaseUrl),
            interpreter = Config::get(ConfigKey::Interpreter),
            max_fix_attempts = Config::get(ConfigKey::MaxFixAttempts),
            execution_timeout = Config::get(ConfigKey::ExecutionTimeout),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let mut description = arg
                    .get_help()
                    .map(|help| return help.to_string())
                    .unwrap_or_default();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                if !arg.get_possible_values().is_empty() {
                    let possible_values = arg
                        .get_possible_values()
                        .iter()
                        .map(|e| return e.get_name())
                        .collect::<Vec<_>>()
                        .join(", ");
                    description = format!("{description} [possible values: {}]", possible_values);
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i64>().is_ok() || val.parse::<bool>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}

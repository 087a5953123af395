#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::commands;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ProviderName;
use crate::domain::models::Session;
use crate::domain::services::Sessions;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

fn format_session(session: &Session) -> String {
    let mut res = format!(
        "- (ID: {}) {}, Status: {}, Fix attempts: {}",
        session.id, session.timestamp, session.status, session.attempt_count
    );

    if !session.task.is_empty() {
        let mut line = session.task.lines().next().unwrap_or_default().to_string();
        if line.chars().count() >= 70 {
            line = format!("{}...", line.chars().take(67).collect::<String>());
        }
        res = format!("{res}, {line}");
    }

    return res;
}

async fn print_sessions_list() -> Result<()> {
    let mut sessions = Sessions::default()
        .list()
        .await?
        .iter()
        .map(|session| {
            return format_session(session);
        })
        .collect::<Vec<String>>();

    sessions.reverse();

    if sessions.is_empty() {
        println!("There are no sessions available. Run `recast pipeline` to start your first one!");
    } else {
        println!("{}", sessions.join("\n"));
    }

    return Ok(());
}

async fn select_session_interactive() -> Result<Option<String>> {
    let mut sessions = Sessions::default().list().await?;
    sessions.reverse();

    if sessions.is_empty() {
        println!("There are no sessions available. Run `recast pipeline` to start your first one!");
        return Ok(None);
    }

    let session_options = sessions
        .iter()
        .map(|session| {
            return format_session(session);
        })
        .collect::<Vec<String>>();

    let idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Which session would you like to show?")
        .default(0)
        .items(&session_options)
        .interact_opt()?;

    return Ok(idx.map(|idx| return sessions[idx].id.to_string()));
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_sessions_delete() -> Command {
    return Command::new("delete")
        .about("Delete one or all sessions.")
        .arg(
            clap::Arg::new("session-id")
                .short('i')
                .long("id")
                .help("Session ID")
                .num_args(1),
        )
        .arg(
            clap::Arg::new("all")
                .long("all")
                .help("Delete all sessions.")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new("delete-args")
                .args(["session-id", "all"])
                .required(true),
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Manage past runs.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the sessions cache directory path."))
        .subcommand(Command::new("list").about("List all previous sessions with their ids and status."))
        .subcommand(
            Command::new("show")
                .about("Show a previous session by ID, including its final script. Omit passing any session ID to load an interactive selection.")
                .arg(
                    clap::Arg::new("session-id")
                        .short('i')
                        .long("id")
                        .help("Session ID")
                        .required(false),
                ),
        )
        .subcommand(subcommand_sessions_delete());
}

fn arg_input(help: &'static str) -> Arg {
    return Arg::new("input")
        .short('i')
        .long("input")
        .num_args(1)
        .required(true)
        .help(help);
}

fn arg_output() -> Arg {
    return Arg::new("output")
        .short('o')
        .long("output")
        .num_args(1)
        .help("File to write the resulting script to. Prints to stdout when omitted.");
}

fn arg_task(required: bool) -> Arg {
    return Arg::new("task")
        .short('t')
        .long("task")
        .num_args(1)
        .required(required)
        .help("Plain language description of what the script should do.");
}

fn arg_url() -> Arg {
    return Arg::new("url")
        .long("url")
        .num_args(1)
        .help("Page the recorder opens first.");
}

fn subcommand_record() -> Command {
    return Command::new("record")
        .about("Opens the browser recorder and outputs the raw recorded script once its window is closed.")
        .arg(arg_url())
        .arg(arg_output());
}

fn subcommand_refine() -> Command {
    return Command::new("refine")
        .about("Rewrites a raw recording into readable, logically named steps matching a task.")
        .arg(arg_task(true))
        .arg(arg_input("Raw recorded script."))
        .arg(arg_output());
}

fn subcommand_run() -> Command {
    return Command::new("run")
        .about("Validates and executes a script once.")
        .arg(arg_input("Script to run."));
}

fn subcommand_fix() -> Command {
    return Command::new("fix")
        .about("Runs a script and keeps asking the LLM to repair it until it succeeds or the fix attempts are used up.")
        .arg(arg_input("Script to run and repair."))
        .arg(arg_task(false))
        .arg(arg_output());
}

fn subcommand_analyze() -> Command {
    return Command::new("analyze")
        .about("Runs a script and asks the LLM to explain why it fails, with suggestions and security concerns.")
        .arg(arg_input("Script to analyze."));
}

fn subcommand_pipeline() -> Command {
    return Command::new("pipeline")
        .about("Records, refines, runs and repairs a script in one go.")
        .arg(arg_task(true))
        .arg(arg_url())
        .arg(
            Arg::new("raw")
                .long("raw")
                .num_args(1)
                .conflicts_with("url")
                .help("Use an existing raw recording instead of opening the recorder."),
        )
        .arg(arg_output());
}

fn subcommand_check() -> Command {
    return Command::new("check")
        .about("Verifies the provider configuration and that it is reachable, without spending tokens.");
}

fn arg_config(key: ConfigKey, help: &str) -> Arg {
    let env_name = format!("RECAST_{}", key.to_string().replace('-', "_").to_uppercase());
    let default = Config::default(key);

    let mut help = help.to_string();
    if !default.is_empty() && key != ConfigKey::ConfigFile {
        help = format!("{help} [default: {default}]");
    }

    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env_name)
        .num_args(1)
        .help(help)
        .global(true);
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("recast")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .subcommand(subcommand_record())
        .subcommand(subcommand_refine())
        .subcommand(subcommand_run())
        .subcommand(subcommand_fix())
        .subcommand(subcommand_analyze())
        .subcommand(subcommand_pipeline())
        .subcommand(subcommand_check())
        .subcommand(subcommand_sessions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_completions())
        .arg(
            arg_config(ConfigKey::ConfigFile, &format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .short('c')
        )
        .arg(
            arg_config(ConfigKey::Provider, "LLM provider used to refine and fix scripts.")
                .short('p')
                .value_parser(PossibleValuesParser::new(ProviderName::VARIANTS)),
        )
        .arg(
            arg_config(ConfigKey::Model, "Model name. Defaults to the provider's general purpose model.")
                .short('m'),
        )
        .arg(arg_config(
            ConfigKey::BaseUrl,
            "Base URL of the provider's API. Defaults to the provider's official endpoint.",
        ))
        .arg(
            arg_config(
                ConfigKey::ApiKey,
                "API key for the provider. Falls back to the provider's usual environment variable, such as OPENAI_API_KEY.",
            )
            .hide_env_values(true),
        )
        .arg(arg_config(
            ConfigKey::LlmTimeout,
            "Seconds to wait for a single LLM response.",
        ))
        .arg(arg_config(
            ConfigKey::LlmRetries,
            "Total tries for refine and analyze calls that were rate limited or hit a network error.",
        ))
        .arg(arg_config(
            ConfigKey::LlmRetryDelay,
            "Milliseconds to wait before the first retry, doubled for every following one.",
        ))
        .arg(arg_config(
            ConfigKey::ExecutionTimeout,
            "Seconds a script may run before it is killed.",
        ))
        .arg(arg_config(
            ConfigKey::MaxFixAttempts,
            "Maximum number of fix attempts before giving up.",
        ))
        .arg(arg_config(
            ConfigKey::ErrorTailLines,
            "Lines of stdout and stderr, counted from the end, sent to the LLM when asking for a fix.",
        ))
        .arg(arg_config(
            ConfigKey::Interpreter,
            "Interpreter used to execute scripts, with optional arguments.",
        ))
        .arg(arg_config(
            ConfigKey::ScriptExtension,
            "File extension of the temporary script file.",
        ))
        .arg(arg_config(
            ConfigKey::RecorderCommand,
            "Recorder command. Receives `-o <file>` and the optional start URL.",
        ))
        .arg(arg_config(
            ConfigKey::RecordingTimeout,
            "Seconds before an open recorder is closed and the recording aborted.",
        ))
        .arg(
            arg_config(
                ConfigKey::CodeValidation,
                "Check scripts for blocked patterns and syntax errors before running them.",
            )
            .value_parser(PossibleValuesParser::new(["true", "false"])),
        )
        .arg(arg_config(
            ConfigKey::BlockedPatterns,
            "Comma separated list of snippets that fail validation.",
        ))
        .arg(arg_config(
            ConfigKey::SyntaxCheck,
            "Command that compiles a script file without running it, used during validation. Empty disables the syntax check.",
        ));
}

fn get_string(matches: &ArgMatches, id: &str) -> Option<String> {
    return matches.get_one::<String>(id).map(|val| return val.to_string());
}

fn get_required(matches: &ArgMatches, id: &str) -> Result<String> {
    match get_string(matches, id) {
        Some(val) => return Ok(val),
        None => bail!(format!("Missing required argument --{id}")),
    }
}

/// Parses the command line and runs the selected command. Returns whether the
/// command succeeded, so a failing script exits non zero without being
/// reported as a crash.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
            }
            _ => {
                subcommand_config().print_long_help()?;
            }
        },
        Some(("sessions", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("dir", _)) => {
                let dir = Sessions::default().cache_dir.to_string_lossy().to_string();
                println!("{dir}");
            }
            Some(("list", _)) => {
                print_sessions_list().await?;
            }
            Some(("show", show_matches)) => {
                let session_id = match get_string(show_matches, "session-id") {
                    Some(session_id) => Some(session_id),
                    None => select_session_interactive().await?,
                };
                if let Some(session_id) = session_id {
                    commands::show_session(&session_id).await?;
                }
            }
            Some(("delete", delete_matches)) => {
                if let Some(session_id) = get_string(delete_matches, "session-id") {
                    Sessions::default().delete(&session_id).await?;
                    println!("Deleted session {session_id}");
                } else if delete_matches.get_flag("all") {
                    Sessions::default().delete_all().await?;
                    println!("Deleted all sessions");
                } else {
                    subcommand_sessions_delete().print_long_help()?;
                }
            }
            _ => {
                subcommand_sessions().print_long_help()?;
            }
        },
        Some(("record", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            commands::record(
                get_string(subcmd_matches, "url"),
                get_string(subcmd_matches, "output"),
            )
            .await?;
        }
        Some(("refine", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            commands::refine(
                &get_required(subcmd_matches, "task")?,
                &get_required(subcmd_matches, "input")?,
                get_string(subcmd_matches, "output"),
            )
            .await?;
        }
        Some(("run", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            return commands::run(&get_required(subcmd_matches, "input")?).await;
        }
        Some(("fix", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            return commands::fix(
                &get_required(subcmd_matches, "input")?,
                get_string(subcmd_matches, "task"),
                get_string(subcmd_matches, "output"),
            )
            .await;
        }
        Some(("analyze", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            return commands::analyze(&get_required(subcmd_matches, "input")?).await;
        }
        Some(("pipeline", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            return commands::pipeline(
                &get_required(subcmd_matches, "task")?,
                get_string(subcmd_matches, "url"),
                get_string(subcmd_matches, "raw"),
                get_string(subcmd_matches, "output"),
            )
            .await;
        }
        Some(("check", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            commands::check().await?;
        }
        _ => {
            build().print_long_help()?;
        }
    }

    return Ok(true);
}

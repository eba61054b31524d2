//! Console host: the plugin driven from a terminal over pseudocode files.
//!
//! [`run_session`] is an interactive REPL using [`rustyline`] (history,
//! line editing); [`run_once`] invokes a single action and exits.

mod commands;
mod host;
mod parse;

pub use host::ConsoleHost;

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

use gepetto::config::Config;
use gepetto::models::ModelDescriptor;
use gepetto::{Plugin, PluginStatus};

pub(crate) use commands::print_models;

/// Runs the interactive session until Ctrl+D or `quit`.
///
/// Readline history is persisted to `~/.cache/gepetto/console_history.txt`.
pub fn run_session(host: &ConsoleHost, plugin: &Plugin) -> Result<()> {
    println!(
        "{} [model: {}] (type help, Ctrl+D to exit)",
        "gepetto".bold().cyan(),
        plugin.active_model().descriptor().name().yellow(),
    );
    println!();

    let mut rl = DefaultEditor::new()?;
    let history_path = Config::cache_dir()?.join(gepetto::constants::HISTORY_FILENAME);
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    loop {
        let prompt = match host.render_current() {
            Some((func, _)) => format!("{} {} ", func.name.dimmed(), ">".green().bold()),
            None => format!("{} ", ">".green().bold()),
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                match commands::handle_command(&line, host, plugin) {
                    Ok(commands::CommandAction::Continue) => {}
                    Ok(commands::CommandAction::Quit) => break,
                    Ok(commands::CommandAction::Unknown(cmd)) => {
                        println!("{} Unknown command: {} (try help)", "?".yellow(), cmd);
                    }
                    Err(e) => eprintln!("{} {:#}", "error:".red().bold(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "goodbye.".dimmed());
                break;
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                break;
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);
    Ok(())
}

/// Runs one action on `function` (or the first function) and prints the result.
pub fn run_once(
    host: &ConsoleHost,
    plugin: &Plugin,
    action: &str,
    function: Option<&str>,
    write: bool,
) -> Result<()> {
    if let Some(name) = function {
        host.goto(name)?;
    }
    commands::run_and_show(host, plugin, action)?;
    if write {
        for path in host.write_back()? {
            println!("{} {}", "wrote".dimmed(), path.display());
        }
    }
    Ok(())
}

/// Loads `files` into a console host and starts the plugin against it.
pub fn start(
    files: &[PathBuf],
    config: &Config,
    config_path: PathBuf,
) -> Result<(std::sync::Arc<ConsoleHost>, Plugin)> {
    let host = ConsoleHost::load(files)?;
    let plugin = gepetto::plugin_entry(host.clone(), config, Some(config_path))?;
    if plugin.init() == PluginStatus::Skip {
        anyhow::bail!("The console host has no decompiler");
    }
    tracing::debug!(comment = %plugin.comment(), "plugin started");
    Ok((host, plugin))
}

/// Model the console starts with, after the `--model` override.
pub fn starting_model(cli_model: Option<&str>, config: &Config) -> ModelDescriptor {
    gepetto::provider::resolve_model(cli_model, config)
}

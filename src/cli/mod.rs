//! Command-line interface definition and dispatch for gepetto.
//!
//! Uses [`clap`] for argument parsing with derive macros. Every subcommand
//! except `models` and `config` loads pseudocode files into the console host
//! and drives the plugin against them.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use gepetto::config::Config;
use gepetto::constants::{EXPLAIN_ACTION, RENAME_ACTION, RENAME_ALL_ACTION};

use crate::console;

/// Top-level CLI structure for gepetto.
#[derive(Parser)]
#[command(
    name = "gepetto",
    about = "Ask a language model to explain and rename decompiled functions"
)]
pub struct Cli {
    /// Config file to use instead of ~/.config/gepetto/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Model to use (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the gepetto CLI.
///
/// The `///` doc comments on variants double as `--help` text rendered by clap.
#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session over pseudocode files
    Session {
        /// Files holding decompiled functions
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Explain a function and attach the explanation as a comment
    Explain(ActionArgs),
    /// Rename a function's local variables
    Rename(ActionArgs),
    /// Rename a function, its variables and the functions it calls
    RenameAll(ActionArgs),
    /// List available models
    Models,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments shared by the one-shot action commands.
#[derive(clap::Args)]
pub struct ActionArgs {
    /// File holding decompiled functions
    pub file: PathBuf,
    /// Function to act on (defaults to the first one in the file)
    #[arg(short, long)]
    pub function: Option<String>,
    /// Write the result back to the file
    #[arg(short, long)]
    pub write: bool,
}

/// Subcommands for the `config` command.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current config (API key redacted)
    Show,
    /// Print the config file path
    Path,
}

/// Parses command-line arguments into a [`Cli`] struct.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;
    let model = console::starting_model(cli.model.as_deref(), &config);
    config.model = model.name().to_string();

    match cli.command {
        Commands::Session { files } => {
            let (host, plugin) = console::start(&files, &config, config_path)?;
            let result = console::run_session(&host, &plugin);
            plugin.term();
            result
        }
        Commands::Explain(args) => one_shot(&config, config_path, EXPLAIN_ACTION, args),
        Commands::Rename(args) => one_shot(&config, config_path, RENAME_ACTION, args),
        Commands::RenameAll(args) => one_shot(&config, config_path, RENAME_ALL_ACTION, args),
        Commands::Models => {
            console::print_models(&model);
            Ok(())
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => {
                    println!("{} {}", "Config path:".bold(), config_path.display());
                    println!();
                    let mut shown = config.clone();
                    if shown.openai.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                        shown.openai.api_key = Some("<redacted>".into());
                    }
                    println!("{}", toml::to_string_pretty(&shown)?);
                }
                ConfigAction::Path => println!("{}", config_path.display()),
            }
            Ok(())
        }
    }
}

fn one_shot(
    config: &Config,
    config_path: PathBuf,
    action: &str,
    args: ActionArgs,
) -> Result<()> {
    let (host, plugin) = console::start(std::slice::from_ref(&args.file), config, config_path)?;
    let result = console::run_once(
        &host,
        &plugin,
        action,
        args.function.as_deref(),
        args.write,
    );
    plugin.term();
    result
}

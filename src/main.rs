//! Entry point for gepetto's console host.
//!
//! This binary loads environment variables, installs logging, parses CLI
//! arguments via [`cli`], and dispatches to the chosen subcommand.

mod cli;
mod console;
mod diff;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Runs the gepetto CLI.
///
/// Loads `.env` files (silently ignored if absent) so `OPENAI_API_KEY` can
/// live there, then parses arguments and runs the subcommand.
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = cli::parse();
    init_tracing(cli.verbose);
    cli::run(cli)
}

/// Logs to stderr; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "gepetto=debug,warn" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

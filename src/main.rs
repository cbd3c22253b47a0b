mod cli;
mod client;
mod config;
mod detect;
mod error;
mod output;
mod retry;
#[cfg(test)]
mod testutil;
mod types;
mod upload;

use clap::Parser;
use colored::Colorize;
use tracing::Level;

fn main() {
    let cli = cli::Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(err) = cli.run() {
        eprintln!(
            "{} {} {err}",
            output::SYMBOL_ERROR.red(),
            "Error:".red().bold()
        );
        std::process::exit(err.exit_code());
    }
}

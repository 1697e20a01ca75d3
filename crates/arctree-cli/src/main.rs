//! Arctree CLI - Command-line utility for browsing archive content trees and
//! extracting entries.

mod cli;
mod commands;
mod error;
mod logger;
mod output;
mod progress;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    logger::init(cli.verbose, cli.quiet);

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);

    match run(&cli, &*formatter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            formatter.format_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &cli::Cli, formatter: &dyn output::OutputFormatter) -> Result<()> {
    let show_progress = !cli.quiet && !cli.json;

    match &cli.command {
        cli::Commands::List(args) => commands::list::execute(args, formatter),
        cli::Commands::Tree(args) => commands::tree::execute(args, formatter),
        cli::Commands::Extract(args) => {
            commands::extract::execute(args, formatter, show_progress)
        }
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    }
}

mod cli;
mod commands;
mod input;
mod resource;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use cloudstack::ConnectionArgs;
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub connection: ConnectionArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        connection: cli.connection.to_args(),
    };

    match cli.command {
        Command::Apply(args) => commands::apply::apply(&ctx, &args.file, args.check),
        Command::Plan(args) => commands::apply::plan(&ctx, &args.file),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "stratus", &mut io::stdout());
            Ok(())
        }
        Command::Types => {
            commands::types::run();
            Ok(())
        }
    }
}

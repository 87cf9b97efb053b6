//! Filterbar CLI entry point.

use clap::Parser;
use filterbar::cli::args::{Cli, Commands, OutputFormat};
use filterbar::cli::output::Output;
use filterbar::cli::{check, convert, replay};
use filterbar::config::Config;
use filterbar::error::{ExitCode as FilterExitCode, FilterError};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => ExitCode::from(code.code() as u8),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {}", e);
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<FilterExitCode, FilterError> {
    let config = Config::load()?;

    let format = cli
        .output_format()
        .or_else(|| {
            config
                .default_output
                .as_deref()
                .and_then(OutputFormat::from_name)
        })
        .unwrap_or_default();
    let output = Output::new(format, cli.quiet);

    match &cli.command {
        Commands::CheckSchema(args) => check::check_schema(&config, args, &output),
        Commands::Check(args) => check::check(&config, args, &output),
        Commands::Convert(args) => convert::convert(&config, args, &output),
        Commands::ParseQuery(args) => convert::parse_query(&config, args, &output),
        Commands::Replay(args) => replay::replay(&config, args, &output),
    }
}

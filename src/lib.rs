pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

use clap::Parser;
use std::process::ExitCode;

pub fn run() -> ExitCode {
    let cli = cli::Cli::parse();
    if let Err(error) = cli::init_tracing(cli.verbose, cli.quiet) {
        eprintln!("error: {error}");
        return ExitCode::FAILURE;
    }

    match cli::execute(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

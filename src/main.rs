//! `vendorsync` command-line entry point.
//!
//! See `README.md` for user documentation and `DESIGN.md` for architecture.

use anyhow::Result;
use clap::Parser;

use vendorsync::cli::{Cli, Command};
use vendorsync::exit_codes::exit;

fn run(cli: Cli) -> Result<i32> {
    Ok(match cli.command {
        Command::Schema => {
            let schema = vendorsync::model::generate_schema()?;
            println!("{}", schema);
            exit::SUCCESS
        }
        Command::Import(args) => vendorsync::engine::import(args)?,
        Command::Plan(args) => vendorsync::engine::plan(args)?,
        Command::Probe(args) => vendorsync::engine::probe(args)?,
    })
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = vendorsync::logging::init(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("warning: {err:#}");
    }
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            exit::PRECONDITION_FAILURE
        }
    };
    std::process::exit(exit_code);
}

use std::ffi::OsString;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use ve_core::VeError;

mod check;
mod cli_args;
mod error_map;
mod simulation;
mod source_loader;

pub(crate) use cli_args::{CheckArgs, Cli, Mode, RunArgs};
pub(crate) use error_map::{emit_error, map_cli_source_path, map_tool_error};
pub(crate) use source_loader::resolve_dir;

// Logs go to stderr; stdout carries the line protocol.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .compact()
        .try_init();
}

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, VeError> {
    match cli.command {
        Mode::Run(args) => simulation::run_simulation(args),
        Mode::Check(args) => check::run_check(args),
    }
}

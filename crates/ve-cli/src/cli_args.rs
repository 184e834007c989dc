use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ve-cli")]
#[command(about = "Scripted virtual-entity runtime CLI")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    Run(RunArgs),
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long = "behaviors-dir")]
    pub(crate) behaviors_dir: String,
    #[arg(long = "spawn", required = true)]
    pub(crate) spawn: Vec<String>,
    #[arg(long = "width", default_value_t = 32)]
    pub(crate) width: u32,
    #[arg(long = "height", default_value_t = 32)]
    pub(crate) height: u32,
    #[arg(long = "duration-ms", default_value_t = 1_000)]
    pub(crate) duration_ms: u64,
    #[arg(long = "config")]
    pub(crate) config: Option<String>,
    #[arg(long = "tick-ms")]
    pub(crate) tick_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(long = "case-dir")]
    pub(crate) case_dir: String,
    #[arg(long = "case-file")]
    pub(crate) case_file: Option<String>,
}

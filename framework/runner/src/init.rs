use crate::cli::ServingBenchCli;
use clap::Parser;

/// Initialise the CLI and logging for the serving bench runner.
pub fn init() -> ServingBenchCli {
    env_logger::init();

    ServingBenchCli::parse()
}

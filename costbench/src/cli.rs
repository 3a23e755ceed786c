use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::{observability, report};

/// Synthetic key/value cache benchmark with miss-cost accounting.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Version(VersionCommand),
}

/// run the benchmark to completion and print the report
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// override the number of worker threads
    #[argh(option, short = 't')]
    threads: Option<usize>,
}

/// print the costbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Parse the arguments and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref())?;

    observability::init_tracing(&config.logging);

    match args.command {
        Command::Run(RunCommand { threads }) => {
            if let Some(threads) = threads {
                config.threads = threads;
            }
            tracing::debug!(?config);

            let result = crate::run(&config)?;
            report::print_report(&result);
            Ok(())
        }
        Command::Version(VersionCommand {}) => unreachable!(),
    }
}

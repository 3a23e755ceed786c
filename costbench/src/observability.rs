use std::env;
use std::io::IsTerminal;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

use crate::config::{LogFormat, Logging};

/// Installs the global tracing subscriber. Logs go to stderr.
///
/// Does nothing if a subscriber is already installed.
pub fn init_tracing(config: &Logging) {
    let (level, env_filter) = parse_rust_log(config.level);

    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let format = match config.format {
        LogFormat::Auto if std::io::stderr().is_terminal() => format.pretty().boxed(),
        LogFormat::Auto | LogFormat::Simplified => format.compact().with_ansi(false).boxed(),
        LogFormat::Pretty => format.pretty().boxed(),
        LogFormat::Json => format.json().flatten_event(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(format.with_filter(level))
        .with(env_filter)
        .try_init()
        .ok();
}

/// Resolves the effective level and filter from `RUST_LOG` and the configured level.
///
/// A plain level in `RUST_LOG` overrides the configured one. Anything else is used literally as
/// a filter directive.
pub fn parse_rust_log(configured: LevelFilter) -> (LevelFilter, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<Level>() {
            Ok(level) => LevelFilter::from(level),
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => configured,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new(
        "INFO,\
        costbench=TRACE,\
        costbench_generators=TRACE,\
        ",
    );

    (level, env_filter)
}

// Logging initialization for the CLI binary.
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. `--verbose` enables debug output for this
/// crate only; `RUST_LOG` overrides everything as usual.
pub fn init_logging(verbose: bool) {
    let (crate_level, default_directive) = if verbose {
        (LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::OFF, "off")
    };
    let crate_filter = Targets::new().with_target("valutahub", crate_level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(crate_filter)
        .with(env_filter)
        .init();
}

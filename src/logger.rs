//! Logging setup.
//!
//! The engine logs through the `log` facade; the subscriber installed here
//! also captures those records through the `tracing-log` bridge. Output goes
//! to stderr so command output on stdout stays clean.

use anyhow::anyhow;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

const LEVELS: [LevelFilter; 6] = [
    LevelFilter::OFF,
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

/// Parse a configured level name; unknown names fall back to `info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Shift `base` up by `verbose` steps and down by `quiet` steps.
pub fn effective_level(base: LevelFilter, verbose: i8, quiet: i8) -> LevelFilter {
    let start = LEVELS.iter().position(|l| *l == base).unwrap_or(3) as i32;
    let idx = (start + verbose as i32 - quiet as i32).clamp(0, LEVELS.len() as i32 - 1);
    LEVELS[idx as usize]
}

/// Install the global subscriber. `RUST_LOG` wins over the computed level.
pub fn init(base_level: &str, verbose: i8, quiet: i8, json: bool) -> anyhow::Result<()> {
    let level = effective_level(parse_level(base_level), verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

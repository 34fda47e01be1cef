use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Picks the crate log level from the `-v` count and `-q` flag.
/// Default is INFO; `-q` wins over any `-v`.
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initializes the global tracing subscriber. `RUST_LOG` directives are
/// honoured for other targets; this crate's level comes from the flags.
pub fn init(verbose: u8, quiet: bool) {
    let level = level_for(verbose, quiet);

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("fs_latency_exporter={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

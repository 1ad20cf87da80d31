//! Logger setup for the server binaries

/// Default filter for the debug flag; `RUST_LOG` overrides it
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Install env_logger on stderr. Safe to call more than once.
pub fn init(debug: bool) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter(debug)),
    )
    .target(env_logger::Target::Stderr)
    .try_init();
}

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Environment variable carrying a tracing filter for the client
pub const LOG_ENV: &str = "SELFLAYER_LOG";

/// Initializes a stderr `tracing_subscriber` using `SELFLAYER_LOG` first, then `RUST_LOG`,
/// then `fallback_level` (from the command line or the config file).
pub fn init_tracing(fallback_level: &str) {
    let filter = env_filter(fallback_level);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

pub fn env_filter(fallback_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(fallback_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

use std::path::PathBuf;

use clap::Parser;

use crate::utils::config::DEFAULT_TIMEOUT_SECS;

/// SelfLayer TUI - AI-powered knowledge management from the terminal
#[derive(Parser, Debug)]
#[command(name = "selflayer")]
#[command(about = "Terminal client for the SelfLayer knowledge-management API")]
#[command(version)]
pub struct CliArgs {
    /// API base URL (overrides SELFLAYER_BASE_URL and the config file)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Config file location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Log level used when SELFLAYER_LOG and RUST_LOG are unset
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,

    /// Use built-in sample data instead of the remote API
    #[arg(long)]
    pub offline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["selflayer"]);
        assert_eq!(args.timeout, 30);
        assert!(args.base_url.is_none());
        assert!(!args.no_color);
        assert!(!args.offline);
    }

    #[test]
    fn test_all_flags() {
        let args = CliArgs::parse_from([
            "selflayer",
            "--base-url",
            "http://localhost:8000/api/v1",
            "--config",
            "/tmp/selflayer.json",
            "--timeout",
            "5",
            "--log-level",
            "debug",
            "--no-color",
            "--offline",
        ]);
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:8000/api/v1"));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/selflayer.json")));
        assert_eq!(args.timeout, 5);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.no_color && args.offline);
    }

    #[test]
    fn test_rejects_non_numeric_timeout() {
        assert!(CliArgs::try_parse_from(["selflayer", "--timeout", "soon"]).is_err());
    }
}

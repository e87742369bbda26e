use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::cli::{CliArgs, OutputFormatter};
use crate::engine::{http_gateway_factory, CommandDispatcher, Flow, GatewayFactory, StdTerminal};
use crate::gateway::{KnowledgeGateway, MockGateway};
use crate::utils::config::{validate_base_url, ClientSettings, ConfigStore, EnvOverrides};
use crate::utils::logging::init_tracing;

/// Key handed to the in-memory gateway in offline mode
pub const OFFLINE_API_KEY: &str = "sl_test_offline_session";

/// Interactive prompt loop around a command dispatcher
pub struct CliRunner {
    dispatcher: CommandDispatcher<StdTerminal>,
}

impl CliRunner {
    /// Build the runner from parsed arguments
    pub fn new(args: &CliArgs) -> anyhow::Result<Self> {
        let base_url = args
            .base_url
            .as_deref()
            .map(validate_base_url)
            .transpose()?;

        let path = match &args.config {
            Some(path) => path.clone(),
            None => ConfigStore::default_path()?,
        };

        let (config, factory) = if args.offline {
            let env = EnvOverrides {
                api_key: Some(OFFLINE_API_KEY.to_string()),
                base_url: None,
            };
            (ConfigStore::open(path, env).read_only(), offline_gateway_factory())
        } else {
            (ConfigStore::open(path, EnvOverrides::from_env()), http_gateway_factory())
        };

        let config = config.with_base_url_flag(base_url);
        let level = args
            .log_level
            .clone()
            .unwrap_or_else(|| config.config().log_level.clone());
        init_tracing(&level);
        info!(config = %config.path().display(), offline = args.offline, "starting selflayer");

        let terminal = StdTerminal::new().context("Failed to create line editor")?;
        let dispatcher = CommandDispatcher::new(
            config,
            terminal,
            Duration::from_secs(args.timeout),
            factory,
        );

        Ok(Self { dispatcher })
    }

    /// Print the welcome banner, then read and dispatch lines until quit, Ctrl-C or EOF
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.dispatcher.print_welcome().await;

        let prompt = format!("{} ", "selflayer>".green().bold());
        loop {
            match self.dispatcher.terminal_mut().read_line(&prompt) {
                Ok(line) => {
                    if self.dispatcher.handle_line(&line).await == Flow::Exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    debug!("input closed");
                    println!("{}", OutputFormatter::format_info("Goodbye!"));
                    break;
                }
                Err(e) => return Err(e).context("Failed to read input"),
            }
        }
        Ok(())
    }
}

/// Factory that always hands out the same in-memory gateway with sample data
fn offline_gateway_factory() -> GatewayFactory {
    let gateway = MockGateway::with_sample_data();
    Box::new(move |_: &ClientSettings| Ok(Box::new(gateway.clone()) as Box<dyn KnowledgeGateway>))
}

/// Main entry point for CLI execution
pub async fn run_cli() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    let mut runner = match CliRunner::new(&args) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{}", OutputFormatter::format_error_panel(&format!("{:#}", e), "Startup Error"));
            std::process::exit(1);
        }
    };
    runner.run().await
}

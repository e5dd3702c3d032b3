//! CLI module for the agentic workflow service
//!
//! Provides subcommands:
//! - `serve`: HTTP API server (default)
//! - `invoke`: one model call through the gateway, printed to stdout

pub mod invoke;
pub mod serve;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Agentic workflow runner - sequential LLM steps with criteria and retries
#[derive(Parser)]
#[command(name = "agentic-workflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server (default mode)
    Serve(serve::ServeArgs),

    /// Send one prompt to a model and print the reply
    Invoke(invoke::InvokeArgs),
}

/// Load `.env` and configuration, then install logging
pub(crate) fn load_config() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = with_load_context(AppConfig::load())?;
    logging::init_logging(&config.logging);
    Ok(config)
}

fn with_load_context(
    loaded: Result<AppConfig, config::ConfigError>,
) -> anyhow::Result<AppConfig> {
    loaded.context("Failed to load configuration (check APP__* variables and config/ files)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from(["agentic-workflow", "serve", "--seed-demo", "--port", "9000"])
            .unwrap();

        match cli.command {
            Some(Command::Serve(args)) => {
                assert!(args.seed_demo);
                assert_eq!(args.port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_invoke() {
        let cli = Cli::try_parse_from([
            "agentic-workflow",
            "invoke",
            "--model",
            "kimi-k2p5",
            "--prompt",
            "Say hello",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Invoke(args)) => {
                assert_eq!(args.model, "kimi-k2p5");
                assert_eq!(args.max_tokens, 400);
            }
            _ => panic!("expected invoke"),
        }
    }

    #[test]
    fn test_bad_configuration_is_reported() {
        let env = [("APP__SERVER__PORT".to_string(), "notaport".to_string())]
            .into_iter()
            .collect();

        let error = with_load_context(AppConfig::load_from_env(Some(env))).unwrap_err();

        assert!(error.to_string().contains("Failed to load configuration"));
    }

    #[test]
    fn test_no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["agentic-workflow"]).unwrap();
        assert!(cli.command.is_none());
    }
}

use clap::Parser;
use agentic_workflow::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(args)) => cli::serve::run(args).await,
        Some(Command::Invoke(args)) => cli::invoke::run(args).await,
        None => cli::serve::run(cli::serve::ServeArgs::default()).await,
    }
}

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::future::Future;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[clap(author, version, about = "on-chain MEV bundle monitor", long_about = None)]
struct Cli {
    #[clap(long, env = "MEV_MONITOR_CONFIG", value_name = "FILE", default_value = "parameters.json")]
    config: String,
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Recalc(cmd::recalc::Command),
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_task_until_signal(task: impl Future<Output = Result<()>>) -> Result<()> {
    tokio::select! {
        task = task => task,
        _ = signal::ctrl_c() => {
            tracing::info!("shutting down...");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging();

    match cli.command {
        Some(Commands::Recalc(command)) => {
            run_task_until_signal(command.execute(cli.config)).await
        }
        None => run_task_until_signal(cmd::run::Command.execute(cli.config)).await,
    }
}

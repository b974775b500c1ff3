//! Main entry point for ChatGate Bot.

use anyhow::Context;
use chatgate_bot::{init_logging, load_config, ChatGateBot, ConsoleMessenger, USER_SERVER};
use chatgate_common::Jid;
use chatgate_config::LogFormat;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML or YAML)
    #[arg(short, long, env = "CHATGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter, overriding the configured one
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Local part of the sender for lines without an identity token
    #[arg(long, default_value = "111")]
    sender: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())
        .await
        .context("failed to load configuration")?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.format = LogFormat::Json;
    }
    let _log_guard = init_logging(&config.logging).context("failed to initialize logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting ChatGate bot");

    let sender = Jid::parse(&format!("{}@{USER_SERVER}", args.sender)).context("invalid --sender")?;
    let bot = ChatGateBot::new(config, Arc::new(ConsoleMessenger::stdout()), sender)?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {:?}", e);
            return;
        }
        info!("Received shutdown signal, starting graceful shutdown");
        signal.cancel();
    });

    bot.run(BufReader::new(tokio::io::stdin()), shutdown).await?;
    Ok(())
}

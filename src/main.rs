//! chatrelay - line-oriented TCP chat server

use anyhow::{Context, Result};
use chatrelay::config::Config;
use chatrelay::history::HistoryStore;
use chatrelay::server::ServerListener;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "A TCP chat relay: pick a name, talk to everyone else connected")]
#[command(version)]
struct Cli {
    /// Port to listen on (defaults to the configured port, 8989)
    port: Option<u16>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let run_stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
    init_logging(&config.storage.log_dir, &run_stamp)?;

    let history = HistoryStore::create(&config.storage.history_dir, &run_stamp)?;
    tracing::info!("Writing history to {:?}", history.path());

    let server = ServerListener::bind(&config, history).await?;

    let message = format!("Server started on port {}", server.local_addr()?.port());
    println!("{}", message);
    tracing::info!("{}", message);

    // Operator console on stdin
    let table = server.table();
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = chatrelay::console::run(stdin, tokio::io::stdout(), table).await {
            tracing::error!("Console error: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    server.run(shutdown_rx).await
}

/// Send diagnostics to `log_dir/log-<run_stamp>.txt`
fn init_logging(log_dir: &Path, run_stamp: &str) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

    let log_path = log_dir.join(format!("log-{}.txt", run_stamp));
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

//! auditchain replica daemon.
//!
//! Runs one replica of the file-access audit ledger: a TCP listener serving
//! the inter-replica RPC surface, and the three background drivers
//! (block scheduler, heartbeat, election) that keep the chain converging.

mod error;
mod listener;
mod node;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tracing::info;

/// auditchain replica daemon.
#[derive(Parser)]
#[command(name = "auditchain-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on, shared with peers as this replica's identity.
    #[arg(default_value = "0.0.0.0:50051")]
    listen_addr: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(run(cli.listen_addr))
}

async fn run(listen_addr: String) -> Result<()> {
    let node = node::assemble(&listen_addr)
        .await
        .context("failed to start replica")?;

    info!(listen_addr, "replica listening");

    let running = Arc::new(AtomicBool::new(true));
    let shutdown_running = running.clone();
    let signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handler")?;
    let signals_handle = signals.handle();
    let signal_task = tokio::spawn(async move {
        let mut signals = signals;
        if signals.next().await.is_some() {
            info!("received shutdown signal");
            shutdown_running.store(false, Ordering::Relaxed);
        }
    });

    node.run_until_shutdown(running).await;

    signals_handle.close();
    let _ = signal_task.await;

    info!("replica stopped gracefully");
    Ok(())
}

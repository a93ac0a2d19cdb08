//! Demo host for the virtual node descriptor watcher.
//!
//! This wires a validated configuration into the scan engine, fans emitted
//! events out over a channel sink, and polls until Ctrl+C:
//! 1. Configuration is validated before anything touches the filesystem
//! 2. Each poll tick runs one scan pass
//! 3. Non-empty batches are broadcast to subscribers

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use virtnode_watcher::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("virtnode_watcher=debug".parse()?),
        )
        .init();

    println!("=== Virtual Node Descriptor Watcher ===\n");

    // Configuration: a JSON file path as the first argument, or a single
    // spec watching the built-in hypervisor layout pattern.
    let config: serde_json::Value = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading configuration from {path}"))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing configuration from {path}"))?
        }
        None => serde_json::json!([{}]),
    };

    let specs = virtnode_watcher::watch::validate(&config)?;
    for spec in &specs {
        println!("Watching: {}", spec.pattern());
    }

    let engine = ScanEngine::new();
    let mut tracker = ChangeTracker::new();
    let (sink, mut events_rx) = ChannelSink::new(256);

    // Print every delivered batch.
    tokio::spawn(async move {
        while let Ok(events) = events_rx.recv().await {
            println!("\n[Scan] {} new or modified descriptors:", events.len());
            for event in &events {
                println!(
                    "  {} (hypervisor: {}, nodetype: {})",
                    event.tag,
                    event.data.hypervisor.as_deref().unwrap_or("-"),
                    event.data.nodetype.as_deref().unwrap_or("-"),
                );
            }
        }
    });

    println!("\nPress Ctrl+C to exit\n");
    println!("Touch a descriptor file under a watched path to see an event.\n");

    let poll_interval = std::time::Duration::from_secs(1);

    // Handle Ctrl+C gracefully
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        println!("\nShutting down...");
        let _ = shutdown_tx.send(());
    });

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                break;
            }
            _ = tokio::time::sleep(poll_interval) => {
                let events = engine.scan(&mut tracker, &specs);
                if !events.is_empty() {
                    sink.deliver(events);
                }
            }
        }
    }

    println!("Done!");

    Ok(())
}

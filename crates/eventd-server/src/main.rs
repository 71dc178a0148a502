//! eventd server - event bus daemon for a virtualization control plane.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventd_core::EventBus;
use eventd_server::{Args, Error, EventService, SessionTable};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventd=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        api_version = eventd_proto::API_VERSION,
        "starting eventd server"
    );

    // Parse command-line arguments
    let args = Args::parse();
    let config = args.into_config();

    tracing::info!(
        max_poll_timeout_secs = config.max_poll_timeout.as_secs(),
        prune_interval = ?config.prune_interval,
        max_records = config.retention.max_records,
        "configuration loaded"
    );

    // Wire up the bus and the session-facing service. The transport layer
    // mounts the service; the object-model layer publishes through it.
    let bus = Arc::new(EventBus::new(config.bus_config()));
    let sessions = Arc::new(SessionTable::new());
    let _service = Arc::new(EventService::new(sessions, bus.clone()));

    // Set up graceful shutdown
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx_clone.send(());
    });

    // Periodic retention passes
    if let Some(interval) = config.prune_interval {
        let bus = bus.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = bus.prune();
                        if report.removed > 0 || report.deferred {
                            tracing::info!(
                                removed = report.removed,
                                deferred = report.deferred,
                                "retention pass complete"
                            );
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    tracing::info!("eventd ready");
    let _ = shutdown_rx.recv().await;

    let snapshot = bus.metrics();
    tracing::info!(
        appends = snapshot.appends,
        batches_delivered = snapshot.batches_delivered,
        "eventd shutdown complete"
    );

    Ok(())
}

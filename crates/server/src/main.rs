//! quire server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use quire_client::{FetchClient, FetchConfig, LifecycleController};
use quire_core::versions::VersionEvent;
use quire_core::{AppConfig, SqliteStorage, Storage, VersionStore};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db = %config.db_path.display(), version = %config.cache_version, "starting quire on stdio transport");

    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.db_path).await?);
    let versions = Arc::new(VersionStore::from_config(storage.clone(), &config));
    let network = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = Arc::new(LifecycleController::from_config(storage, network, &config)?);

    spawn_event_logging(&versions, &worker);

    if config.install_on_start {
        let worker = worker.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.on_install().await {
                tracing::error!(error = %e, "worker install failed");
                return;
            }
            if let Err(e) = worker.on_activate().await {
                tracing::error!(error = %e, "worker activation failed");
            }
        });
    }

    let handler = handler::QuireServer::new(versions, worker);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}

/// Mirror store and worker notifications into the log.
fn spawn_event_logging(versions: &VersionStore, worker: &LifecycleController) {
    let mut version_events = versions.subscribe();
    tokio::spawn(async move {
        loop {
            match version_events.recv().await {
                Ok(VersionEvent::Saved { document_id, version_id }) => {
                    tracing::info!(document_id = %document_id, version_id, "version saved");
                }
                Ok(VersionEvent::Restored { document_id, content }) => {
                    tracing::info!(document_id = %document_id, bytes = content.len(), "version restored");
                }
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "version event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut worker_events = worker.subscribe();
    tokio::spawn(async move {
        loop {
            match worker_events.recv().await {
                Ok(event) => tracing::info!(event = ?event, "worker event"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "worker event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

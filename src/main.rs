use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use livehub::archive::{Archiver, FsObjectStore, ObjectStore};
use livehub::cli::Cli;
use livehub::http::{self, AppState};
use livehub::{StreamRegistry, StreamServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("livehub=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.server_config();

    let store = Arc::new(FsObjectStore::new(
        &cli.storage_root,
        &cli.storage_public_url,
        &cli.storage_presign_secret,
    ));
    let archiver = Archiver::new(
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        cli.storage_bucket.clone(),
    );
    archiver
        .prepare()
        .await
        .with_context(|| format!("failed to provision bucket {:?}", cli.storage_bucket))?;

    tracing::info!(
        root = %cli.storage_root.display(),
        bucket = %cli.storage_bucket,
        "Object store ready"
    );

    let registry = Arc::new(StreamRegistry::with_config(cli.registry_config()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let state = AppState::new(Arc::clone(&registry), archiver.clone(), config.presign_ttl)
        .with_objects(store);
    let http_addr = config.http_addr;
    let mut http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        let shutdown = async move {
            let _ = http_shutdown.wait_for(|stop| *stop).await;
        };
        if let Err(e) = http::serve(http_addr, state, shutdown).await {
            tracing::error!(error = %e, "Query API failed");
        }
    });

    let server = StreamServer::new(config, registry, archiver);
    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await;

    let _ = shutdown_tx.send(true);
    let _ = http_task.await;

    result.context("stream server failed")?;
    tracing::info!("Shut down");
    Ok(())
}

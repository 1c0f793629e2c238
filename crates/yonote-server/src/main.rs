//! `yonote` server entry point.
//!
//! Opens the storage backend, derives the content key, then starts the Axum
//! HTTP server with graceful shutdown. A background cleanup worker runs
//! alongside the server and is cancelled on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use yonote_core::crypto::ContentCipher;
use yonote_storage::{MemoryBackend, StorageBackend};

use yonote_server::app::build_router;
use yonote_server::cleanup::cleanup_worker;
use yonote_server::config::{ServerConfig, StorageBackendType};
use yonote_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(
        storage = ?config.storage_backend,
        environment = %config.environment,
        admin_enabled = config.admin_password_hash.is_some(),
        "yonote starting"
    );
    for warning in &config.warnings {
        warn!("{warning}");
    }
    if !config.cookie_secure {
        warn!("YONOTE_COOKIE_SECURE is off, cookies will be sent over plain HTTP");
    }

    let storage = open_storage(&config.storage_backend).await?;

    // PBKDF2 at 100k rounds; keep it off the async workers.
    let (passphrase, salt) = (config.encryption_key.clone(), config.encryption_salt.clone());
    let cipher = tokio::task::spawn_blocking(move || ContentCipher::from_passphrase(&passphrase, &salt))
        .await
        .context("content key derivation task failed")?;

    let state = Arc::new(
        AppState::new(storage, cipher, &config).context("cannot build application state")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cleanup_handle = {
        let state = Arc::clone(&state);
        let mut rx = shutdown_rx.clone();
        let interval_secs = config.cleanup_interval_secs;
        tokio::spawn(async move {
            cleanup_worker(state, &mut rx, interval_secs).await;
        })
    };

    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "yonote server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await
    .context("server error")?;

    info!("waiting for cleanup worker to stop");
    let _ = tokio::time::timeout(Duration::from_secs(10), cleanup_handle).await;

    info!("yonote server stopped");
    Ok(())
}

/// Open the configured storage backend.
async fn open_storage(backend: &StorageBackendType) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match backend {
        StorageBackendType::Memory => {
            warn!("using in-memory storage, notes will not survive a restart");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "rocksdb-backend")]
        StorageBackendType::RocksDb { path } => {
            info!(path = %path, "opening rocksdb storage");
            let db = yonote_storage::RocksDbBackend::open(path)
                .with_context(|| format!("cannot open rocksdb at {path}"))?;
            Ok(Arc::new(db))
        }
        #[cfg(feature = "redb-backend")]
        StorageBackendType::Redb { path } => {
            info!(path = %path, "opening redb storage");
            let db = yonote_storage::RedbBackend::open(path)
                .with_context(|| format!("cannot open redb at {path}"))?;
            Ok(Arc::new(db))
        }
        #[cfg(feature = "postgres-backend")]
        StorageBackendType::Postgres { url } => {
            info!("connecting to postgres storage");
            let db = yonote_storage::PostgresBackend::connect(url)
                .await
                .context("cannot connect to postgres")?;
            Ok(Arc::new(db))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!(
            "storage {other:?} is not compiled in; rebuild with its `*-backend` feature"
        ),
    }
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}

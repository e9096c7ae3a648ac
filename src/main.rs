#[macro_use]
extern crate tracing;

use std::sync::Arc;

use chunkgame_server::config::Config;
use chunkgame_server::orchestrator::Orchestrator;
use chunkgame_server::persistence::cache::ChunkCache;
use chunkgame_server::persistence::db::ChunkStore;
use chunkgame_server::persistence::Store;
use chunkgame_server::players::{Bus, Hub, PlayerRegistry};
use chunkgame_server::session::{self, SessionContext};
use chunkgame_server::worker;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const STORE_CONNECT_RETRIES: u32 = 10;
const STORE_CONNECT_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config = Config::from_env()?;
    info!(target: "bootstrap", port = config.server.port, "starting up");

    let db = match ChunkStore::connect(&config.store.database_url, STORE_CONNECT_RETRIES, STORE_CONNECT_RETRY_DELAY).await {
        Ok(db) => db,
        Err(e) => {
            error!(target: "bootstrap", error = %e, "database connection exhausted all retries, exiting");
            std::process::exit(1);
        }
    };

    let cache = ChunkCache::connect(&config.cache.redis_url, config.cache.chunk_ttl_secs).await?;
    let registry = PlayerRegistry::connect(&config.cache.redis_url, config.cache.player_ttl_secs).await?;
    let bus = Bus::connect(&config.cache.redis_url).await?;

    if config.store.debug_mode {
        warn!(target: "bootstrap", "DEBUG_MODE set: truncating store and purging cache");
        db.truncate().await?;
        cache.purge_debug_keys().await?;
    }

    let store = Arc::new(Store::new(cache, db));
    let hub = Arc::new(Hub::new(registry, bus));

    let (response_tx, response_rx) = flume::unbounded();
    let workers = worker::spawn_pool(config.server.worker_pool_size, config.world.seed, &response_tx);

    let orchestrator = Orchestrator::new(store.clone(), hub.clone(), workers.clone());
    tokio::spawn(orchestrator.clone().run_response_listener(response_rx));
    tokio::spawn(orchestrator.clone().run_sweeper());
    tokio::spawn(hub.clone().run_listener(workers));

    let ctx = Arc::new(SessionContext { orchestrator, store, hub });

    let listener = TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    info!(target: "bootstrap", port = config.server.port, "listening");

    tokio::select! {
        () = accept_loop(listener, ctx) => {}
        () = shutdown_signal() => {
            info!(target: "bootstrap", "shutdown signal received, exiting");
        }
    }

    Ok(())
}

async fn accept_loop(listener: TcpListener, ctx: Arc<SessionContext>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                trace!(target: "bootstrap", %addr, "accepted connection");
                let ctx = ctx.clone();
                tokio::spawn(session::accept(stream, ctx));
            }
            Err(e) => {
                warn!(target: "bootstrap", error = %e, "accept failed");
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

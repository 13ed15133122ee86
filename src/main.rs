use respite::command::Engine;
use respite::config::Config;
use respite::persistence::aof::{self, Aof, FSYNC_INTERVAL, FsyncPolicy};
use respite::server;
use respite::store::DataStore;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Parse command line args
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args);

    // Initialize tracing; RUST_LOG wins over --loglevel
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.loglevel));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Arc::new(RwLock::new(DataStore::new()));
    let mut engine = Engine::new(store);
    let shutdown = CancellationToken::new();
    let mut fsync_task = None;

    if config.appendonly {
        let aof_path = config.aof_path();

        // Replay before attaching the writer so replayed commands aren't logged twice
        info!("Replaying AOF from {}...", aof_path.display());
        let replayed = aof::replay(&aof_path, &engine).await?;
        info!("AOF replayed {} commands", replayed.commands);

        // New appends must follow the last complete record
        aof::truncate_tail(&aof_path, replayed.valid_len)?;

        let policy = config.fsync_policy();
        let writer = Arc::new(Aof::open(&aof_path, policy)?);
        info!("AOF enabled: {} (appendfsync {policy:?})", aof_path.display());
        if policy == FsyncPolicy::Everysec {
            fsync_task = Some(aof::spawn_fsync_task(
                writer.clone(),
                FSYNC_INTERVAL,
                shutdown.clone(),
            ));
        }
        engine = engine.with_aof(writer);
    }

    let engine = Arc::new(engine);
    let config = Arc::new(RwLock::new(config));
    let result = server::run_server(engine.clone(), config, shutdown.clone()).await;

    // Stop the fsync loop before closing the file it syncs
    shutdown.cancel();
    if let Some(task) = fsync_task {
        let _ = task.await;
    }
    if let Some(writer) = engine.aof() {
        writer.close().await?;
        info!("AOF closed");
    }

    result.map_err(std::io::Error::other)
}

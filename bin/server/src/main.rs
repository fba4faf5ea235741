use runforge_agent::{AgentDriver, EchoAgent};
use runforge_journal::PgEventJournal;
use runforge_queue::{NatsArtifactStore, NatsConfig, NatsQueueBus};
use runforge_runner::{RunSupervisor, WorkerPool, run_kick_queued_loop, run_requeue_stale_loop};
use runforge_server::config::ServerConfig;
use runforge_store::PgRunStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let nats_config = NatsConfig::new(config.nats_url.clone());
    let bus = Arc::new(
        NatsQueueBus::new(nats_config.clone())
            .await
            .expect("failed to connect to NATS"),
    ) as Arc<dyn runforge_queue::QueueBus>;
    let artifacts = Arc::new(
        NatsArtifactStore::new(&nats_config)
            .await
            .expect("failed to open artifact bucket"),
    ) as Arc<dyn runforge_queue::ArtifactStore>;

    let store = Arc::new(PgRunStore::new(db_pool.clone())) as Arc<dyn runforge_store::RunStore>;
    let journal =
        Arc::new(PgEventJournal::new(db_pool)) as Arc<dyn runforge_journal::EventJournal>;

    // The production agent core is linked by the deployment; the echo
    // agent keeps the daemon runnable for development and smoke tests.
    tracing::warn!("no agent core linked, using the echo agent");
    let agent = Arc::new(EchoAgent::new(
        config.model_selector().with_default("anthropic", "dev"),
    ));
    let driver = AgentDriver::new(agent, config.phase_timeouts());

    let worker_config = config.worker_config();
    let supervisor = Arc::new(RunSupervisor::new(
        Arc::clone(&store),
        Arc::clone(&journal),
        driver,
        artifacts,
        worker_config.clone(),
    ));

    let shutdown = CancellationToken::new();

    let requeue = tokio::spawn(run_requeue_stale_loop(
        Arc::clone(&store),
        Arc::clone(&bus),
        worker_config.clone(),
        shutdown.clone(),
    ));
    let kick = tokio::spawn(run_kick_queued_loop(
        Arc::clone(&store),
        Arc::clone(&bus),
        worker_config.clone(),
        shutdown.clone(),
    ));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            signal_shutdown.cancel();
        }
    });

    let pool = WorkerPool::new(supervisor, bus, worker_config.concurrency);
    tracing::info!(
        concurrency = worker_config.concurrency,
        "worker pool started"
    );
    pool.run(shutdown.clone()).await;

    shutdown.cancel();
    requeue.await.ok();
    kick.await.ok();
    tracing::info!("shut down cleanly");
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use storyreel_backends::{HttpImageBackend, HttpVideoBackend, LocalObjectStore, ObjectStore};
use storyreel_db::store::{MemoryStore, PgRecordStore, RecordStore};
use storyreel_events::{EventBus, EventLog};
use storyreel_pipeline::assembly::{AssemblyEngine, FfmpegLoader};
use storyreel_pipeline::generation::{Backends, GenerationOrchestrator};
use storyreel_pipeline::PipelineService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyreel_api::config::ServerConfig;
use storyreel_api::router::build_app_router;
use storyreel_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyreel_api=debug,storyreel_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Record store ---
    let (store, pool) = match &config.database_url {
        Some(database_url) => {
            let pool = storyreel_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            storyreel_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            storyreel_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool.clone()));
            (store, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory only");
            let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
            (store, None)
        }
    };

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let event_log_handle = tokio::spawn(EventLog::run(event_bus.subscribe()));

    // --- Pipeline ---
    let pipeline_config = &config.pipeline;
    let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
        &pipeline_config.storage_root,
        &pipeline_config.storage_public_url,
    ));
    let backends = Backends {
        image: Arc::new(HttpImageBackend::new(
            &pipeline_config.image_backend_url,
            &pipeline_config.image_model,
        )),
        video: Arc::new(HttpVideoBackend::new(
            &pipeline_config.video_backend_url,
            &pipeline_config.video_model,
        )),
        objects: Arc::clone(&objects),
    };
    let orchestrator = GenerationOrchestrator::new(
        Arc::clone(&store),
        backends,
        Arc::clone(&event_bus),
        pipeline_config.retry_policy(),
        pipeline_config.poll_config(),
    );
    let assembly = AssemblyEngine::new(
        FfmpegLoader::new(&pipeline_config.ffmpeg_work_dir),
        objects,
    );
    let pipeline = Arc::new(PipelineService::new(
        store,
        orchestrator,
        assembly,
        Arc::clone(&event_bus),
    ));
    tracing::info!(
        image_backend = %pipeline_config.image_backend_url,
        video_backend = %pipeline_config.video_backend_url,
        "Pipeline ready",
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline: Arc::clone(&pipeline),
        event_bus: Arc::clone(&event_bus),
        pool,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    pipeline.shutdown().await;

    // The event log ends once every sender is gone.
    drop(pipeline);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), event_log_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

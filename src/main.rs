use hermes::{
    app,
    event::{EventBroker, EventBus, EventPublisher, RedisBroker},
    room::{
        repository::{InMemoryRoomRepository, PostgresRoomRepository, RoomRepository},
        start_cleanup_task, RoomService,
    },
    AppState, Config,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(config = ?config, "Starting hermes signaling server");

    if let Err(e) = run(config).await {
        error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let room_repository: Arc<dyn RoomRepository + Send + Sync> = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Using PostgreSQL room store");
            Arc::new(PostgresRoomRepository::new(pool))
        }
        None => {
            warn!("HERMES_DATABASE_URL not set, rooms are kept in memory");
            Arc::new(InMemoryRoomRepository::new())
        }
    };

    let broker: Arc<dyn EventBroker> = match &config.broker_url {
        Some(broker_url) => Arc::new(RedisBroker::connect(broker_url).await?),
        None => {
            warn!("HERMES_BROKER_URL not set, room events stay in-process");
            Arc::new(EventBus::default())
        }
    };
    info!(broker = broker.name(), "Event broker ready");

    let (publisher, publisher_worker) = EventPublisher::spawn(broker, config.publisher_config());
    let room_service = Arc::new(RoomService::new(
        room_repository,
        publisher,
        config.room_settings(),
    ));

    let cleanup = config.cleanup_config().map(|cleanup_config| {
        tokio::spawn(start_cleanup_task(room_service.clone(), cleanup_config))
    });

    let app = app(AppState::new(room_service.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, flushing pending room events");
    if let Some(cleanup) = cleanup {
        cleanup.abort();
        let _ = cleanup.await;
    }
    if let Err(e) = room_service.publisher().flush().await {
        warn!(error = %e, "Could not flush pending room events");
    }

    // Worker exits once the last publisher handle is gone
    drop(room_service);
    if tokio::time::timeout(config.publish_timeout, publisher_worker)
        .await
        .is_err()
    {
        warn!("Event publisher did not stop in time");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

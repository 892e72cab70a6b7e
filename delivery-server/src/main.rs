use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use shared::error::{AppError, AppResult};
use shared::models::{Event, EventType};

use delivery_server::api;
use delivery_server::cache::Cache;
use delivery_server::config::Config;
use delivery_server::db;
use delivery_server::events::{EventConsumer, EventHandler, EventProducer};
use delivery_server::logger;
use delivery_server::state::AppState;

/// Demonstration consumer-side handler; real projections would hang off the
/// same registration point.
struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) -> AppResult<()> {
        info!(event_id = %event.id, event_type = %event.event_type(), "processing event");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env();
    logger::init(&config.logger);

    info!("starting delivery platform server");

    let pool = db::connect(&config.database).await?;
    let cache = Cache::connect(&config.redis)
        .await
        .map_err(|err| AppError::dependency(format!("failed to connect to redis: {err}")))?;
    let producer = Arc::new(EventProducer::new(&config.kafka)?);

    let mut consumer = EventConsumer::new(&config.kafka)?;
    consumer.register_handler(EventType::OrderCreated, Arc::new(LoggingHandler));
    consumer.register_handler(EventType::OrderStatusChanged, Arc::new(LoggingHandler));
    consumer.start()?;

    let state = AppState::new(Arc::new(config.clone()), pool.clone(), cache, producer)?;
    let app = api::router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|err| AppError::internal(format!("failed to bind {address}: {err}")))?;

    info!(address = %address, "http server started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::internal(format!("server error: {err}")))?;

    // Shutdown order: consumer first (stop pulling work), then the drained
    // HTTP server above, then the producer and connections.
    info!("shutting down");
    consumer.stop().await;
    pool.close().await;
    info!("server exited");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

mod context;
mod errors;
mod live;
mod routes;

pub use context::AppContext;
pub use errors::ApiError;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::config::ServerConfig;

pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/webhook/:provider", post(routes::receive_webhook))
        .route("/test-notification", post(routes::test_notification))
        .route("/api/transactions", get(routes::list_transactions).delete(routes::clear_transactions))
        .route("/api/config", get(routes::config))
        .route("/api/logs", get(routes::logs))
        .route("/debug/webhook", post(routes::debug_webhook))
        .route("/health", get(routes::health))
        .route("/ws", get(live::live_channel))
        .with_state(context)
}

/// Binds the configured address and serves until SIGINT or SIGTERM.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.address()).await?;
    let context = Arc::new(AppContext::new(config));

    run(listener, context, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves, then closes every live session.
pub async fn run<F>(listener: TcpListener, context: Arc<AppContext>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static
{
    info!("Relay listening on {}", listener.local_addr()?);

    let closing = context.clone();
    let app = router(context);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            closing.shutdown();
        })
        .await?;

    info!("Relay stopped");

    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = signal::ctrl_c().await {
            error!("Could not listen for Ctrl-C: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                error!("Could not listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {}
    }

    info!("Shutdown signal received, closing gracefully");
}

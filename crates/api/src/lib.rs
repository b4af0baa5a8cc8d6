pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum application router.
///
/// `cors_origin` of `None` or `"*"` allows any origin; otherwise only that
/// origin is allowed, with credentials.
pub fn build_router(state: Arc<AppState>, cors_origin: Option<&str>) -> anyhow::Result<Router> {
    let cors = match cors_origin {
        None | Some("*") => CorsLayer::permissive(),
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("invalid CORS origin {:?}", origin))?,
            )
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    };

    Ok(Router::new()
        .nest("/api", routes::api_routes(Arc::clone(&state)))
        .route("/ws", get(ws::ws_handler))
        .route("/ws/chat", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serve `app` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("API server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("API server stopped");
    Ok(())
}

/// Bind `bind_addr` and serve `app` until `shutdown` resolves.
pub async fn start_server<F>(app: Router, bind_addr: &str, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    serve(listener, app, shutdown).await
}

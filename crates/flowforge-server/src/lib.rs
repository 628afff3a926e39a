pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Templates
        .route("/api/templates", get(routes::templates::list_templates))
        .route("/api/templates/{id}", get(routes::templates::get_template))
        .route(
            "/api/templates/{id}/batch-header",
            get(routes::templates::batch_header),
        )
        .route(
            "/api/templates/{id}/materialize",
            post(routes::templates::materialize),
        )
        // Batches
        .route("/api/batches", post(routes::batches::submit_batch))
        // Jobs
        .route("/api/jobs", get(routes::jobs::list_jobs))
        .route("/api/jobs/{id}", get(routes::jobs::get_job))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the API for the project at `root`.
///
/// The job database is opened once here and held for the lifetime of the
/// server.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener).await
}

/// Like `serve`, on a listener the caller already bound (e.g. port 0).
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app_state = state::AppState::open(root)?;
    let app = build_router(app_state);

    tracing::info!("flowforge API listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}

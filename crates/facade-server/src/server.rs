use std::net::SocketAddr;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::handlers::{
    admin::{index_report, request_scan},
    health::health_check,
    metrics::metrics_handler,
    pull_requests::{create_pull_request, list_pull_requests},
    repository::{
        find_issue, get_branches, get_commit, get_commits, get_issues, get_tags,
        search_issues_in_ranges,
    },
    webhook::receive_webhook,
};
use crate::middleware::{LoggingLayer, RequestIdLayer};
use crate::state::AppState;

/// Prefijo de la API REST.
pub const API_PREFIX: &str = "/rest/api/1";

/// Creates the application router.
pub fn create_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(RequestIdLayer)
        .layer(LoggingLayer);

    // Router for metrics endpoint (different state)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    let api_router = Router::new()
        // Queries
        .route("/repository/commits", get(get_commits))
        .route("/repository/commits/{commit_id}", get(get_commit))
        .route("/repository/branches", get(get_branches))
        .route("/repository/tags", get(get_tags))
        .route("/repository/issues", get(get_issues))
        .route(
            "/repository/search-issues-in-ranges",
            post(search_issues_in_ranges),
        )
        .route("/repository/find/{issue_key}", get(find_issue))
        .route(
            "/repository/pull-requests",
            get(list_pull_requests).post(create_pull_request),
        )
        // Index
        .route("/webhooks/{vcs_service_id}", post(receive_webhook))
        .route("/admin/scan", post(request_scan))
        .route("/admin/index-report", get(index_report));

    let app_router = Router::new()
        .route("/health", get(health_check))
        .nest(API_PREFIX, api_router)
        .with_state(state);

    Router::new()
        .merge(app_router)
        .merge(metrics_router)
        .layer(middleware::from_fn(
            crate::metrics::http::http_metrics_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(middleware_stack)
}

/// Serves `app` on `addr` until Ctrl+C or SIGTERM.
pub async fn run_server(addr: SocketAddr, app: Router) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

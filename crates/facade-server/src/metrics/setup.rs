//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::{cache::register_cache_metrics, http::register_http_metrics};

/// Inicializa el sistema de metricas y retorna el handle para el endpoint.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    // Buckets para histogramas (en segundos)
    let handle = PrometheusBuilder::new()
        .set_buckets(&[
            0.001, // 1 milisegundo
            0.005, // 5 milisegundos
            0.01,  // 10 milisegundos
            0.025, // 25 milisegundos
            0.05,  // 50 milisegundos
            0.1,   // 100 milisegundos
            0.25,  // 250 milisegundos
            0.5,   // 500 milisegundos
            1.0,   // 1 segundo
            2.5,   // 2.5 segundos
            5.0,   // 5 segundos
            10.0,  // 10 segundos
            30.0,  // 30 segundos
        ])?
        .install_recorder()?;

    register_http_metrics();
    register_cache_metrics();
    register_sync_metrics();

    info!("Metrics system initialized");
    Ok(handle)
}

/// Registra las metricas de jobs, scans y webhooks
fn register_sync_metrics() {
    metrics::describe_counter!(
        "facade_jobs_total",
        "Deferred-result jobs by outcome (completed, deferred, failed)"
    );
    metrics::describe_counter!(
        "facade_scans_total",
        "Repository scans by outcome (reconciled, removed, failed, rejected)"
    );
    metrics::describe_counter!(
        "facade_webhook_events_total",
        "Normalized webhook events by kind"
    );
}

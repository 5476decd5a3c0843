//! Webhook receiver.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use facade_vcs::WebhookHeaders;

use crate::error::AppError;
use crate::signature::verify_signature;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAccepted {
    /// Eventos normalizados encolados para ingesta.
    pub events: usize,
}

/// POST /rest/api/1/webhooks/{vcsServiceId}
///
/// Valida la firma (si el backend tiene secret), normaliza el payload y
/// aplica los eventos en background.
#[instrument(skip_all, fields(vcs_service_id = %vcs_service_id))]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(vcs_service_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAccepted>), AppError> {
    let backend = state.registry.by_service_id(&vcs_service_id)?;
    if let Some(secret) = &backend.webhook_secret {
        let signature = headers
            .get(backend.client.signature_header())
            .and_then(|v| v.to_str().ok());
        verify_signature(secret, signature, &body)?;
    }

    let webhook_headers: WebhookHeaders = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();
    let events = state.ingestor.parse(&vcs_service_id, &webhook_headers, &body)?;
    let count = events.len();
    info!(events = count, "Webhook accepted");

    if count > 0 {
        let ingestor = state.ingestor.clone();
        tokio::spawn(async move {
            if let Err(e) = ingestor.ingest(&vcs_service_id, events).await {
                warn!(vcs_service_id = %vcs_service_id, error = %e, "Webhook ingestion failed");
            }
        });
    }

    Ok((StatusCode::ACCEPTED, Json(WebhookAccepted { events: count })))
}

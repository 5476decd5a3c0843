//! Admin endpoints over the index.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::{instrument, warn};

use facade_core::{FacadeError, RepositoryCoordinates, RepositoryInfo};

use crate::error::AppError;
use crate::extractors::RepositoryParams;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequested {
    pub repository_id: String,
    /// False if the scan queue was full; the scheduler picks it up later.
    pub submitted: bool,
}

/// POST /rest/api/1/admin/scan
///
/// Marca el repositorio para scan y lo encola sin esperar el resultado.
/// Resuelve contra el backend directamente, sin pasar por el cache.
#[instrument(skip_all, fields(ssh_url = %params.ssh_url))]
pub async fn request_scan(
    State(state): State<AppState>,
    Query(params): Query<RepositoryParams>,
) -> Result<(StatusCode, Json<ScanRequested>), AppError> {
    let backend = state.registry.resolve(&params.ssh_url)?;
    let coordinates = RepositoryCoordinates::from_ssh_url(&params.ssh_url)?;
    let repository = backend.client.get_repository(&coordinates).await?;

    let submitted = match state.scheduler.submit_now(&repository).await {
        Ok(_) => true,
        Err(e @ FacadeError::Unexpected(_)) => {
            warn!(repository = %repository, error = %e, "Scan left for the scheduler");
            false
        },
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanRequested {
            repository_id: repository.id,
            submitted,
        }),
    ))
}

/// GET /rest/api/1/admin/index-report
pub async fn index_report(State(state): State<AppState>) -> Result<Json<Vec<RepositoryInfo>>, AppError> {
    Ok(Json(state.index.all_infos(state.batch_size).await?))
}

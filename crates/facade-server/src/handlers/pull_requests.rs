//! Pull request endpoints, served live from the backend.

use axum::{
    Json,
    extract::{Query, State},
};
use serde_json::Value;
use tracing::{info, instrument};

use facade_vcs::NewPullRequest;

use crate::error::AppError;
use crate::extractors::{RepositoryParams, RequestId};
use crate::state::AppState;

/// GET /rest/api/1/repository/pull-requests
#[instrument(skip_all, fields(request_id = %request_id, ssh_url = %params.ssh_url))]
pub async fn list_pull_requests(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Query(params): Query<RepositoryParams>,
) -> Result<Json<Value>, AppError> {
    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            let (client, repository) = state.resolve_repository(&params.ssh_url).await?;
            client.get_pull_requests(&repository).await
        })
        .await?;
    Ok(Json(value))
}

/// POST /rest/api/1/repository/pull-requests
///
/// Un reintento con el mismo request id no crea un segundo pull request.
#[instrument(skip_all, fields(request_id = %request_id, ssh_url = %params.ssh_url))]
pub async fn create_pull_request(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Query(params): Query<RepositoryParams>,
    Json(request): Json<NewPullRequest>,
) -> Result<Json<Value>, AppError> {
    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            let (client, repository) = state.resolve_repository(&params.ssh_url).await?;
            let created = client.create_pull_request(&repository, &request).await?;
            info!(repository = %repository, index = created.index, "Pull request created");
            Ok(created)
        })
        .await?;
    Ok(Json(value))
}

//! Query endpoints sobre repositorios.
//!
//! Cada query corre como job del `JobExecutor`, keyed por el request id:
//! si no termina dentro del fast-work timeout el cliente recibe un 202 y
//! reintenta con el mismo id.

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use facade_core::{Commit, FacadeError, is_issue_key, issue_keys};
use facade_vcs::{RangeQuery, RangeResolver};

use crate::error::AppError;
use crate::extractors::{RangeParams, RepositoryParams, RequestId};
use crate::state::AppState;

/// GET /rest/api/1/repository/commits
///
/// Commits del rango `(fromId | fromDate, toId]`.
#[instrument(skip_all, fields(request_id = %request_id, ssh_url = %params.ssh_url))]
pub async fn get_commits(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Query(params): Query<RangeParams>,
) -> Result<Json<Value>, AppError> {
    let query = params.range_query()?;
    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            resolve_range(&state, &params.ssh_url, &query).await
        })
        .await?;
    Ok(Json(value))
}

/// GET /rest/api/1/repository/commits/{commitId}
#[instrument(skip_all, fields(request_id = %request_id, commit_id = %commit_id))]
pub async fn get_commit(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Path(commit_id): Path<String>,
    Query(params): Query<RepositoryParams>,
) -> Result<Json<Value>, AppError> {
    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            let (client, repository) = state.resolve_repository(&params.ssh_url).await?;
            client.get_commit(&repository, &commit_id).await
        })
        .await?;
    Ok(Json(value))
}

/// GET /rest/api/1/repository/branches
#[instrument(skip_all, fields(request_id = %request_id, ssh_url = %params.ssh_url))]
pub async fn get_branches(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Query(params): Query<RepositoryParams>,
) -> Result<Json<Value>, AppError> {
    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            let (client, repository) = state.resolve_repository(&params.ssh_url).await?;
            client.get_branches(&repository).await
        })
        .await?;
    Ok(Json(value))
}

/// GET /rest/api/1/repository/tags
#[instrument(skip_all, fields(request_id = %request_id, ssh_url = %params.ssh_url))]
pub async fn get_tags(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Query(params): Query<RepositoryParams>,
) -> Result<Json<Value>, AppError> {
    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            let (client, repository) = state.resolve_repository(&params.ssh_url).await?;
            client.get_tags(&repository).await
        })
        .await?;
    Ok(Json(value))
}

/// GET /rest/api/1/repository/issues
///
/// Issue keys mencionadas en los mensajes de commit del rango, ordenadas.
#[instrument(skip_all, fields(request_id = %request_id, ssh_url = %params.ssh_url))]
pub async fn get_issues(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Query(params): Query<RangeParams>,
) -> Result<Json<Value>, AppError> {
    let query = params.range_query()?;
    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            let commits = resolve_range(&state, &params.ssh_url, &query).await?;
            Ok(mentioned_keys(&commits))
        })
        .await?;
    Ok(Json(value))
}

/// Body de POST /rest/api/1/repository/search-issues-in-ranges.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIssuesRequest {
    pub issue_keys: Vec<String>,
    pub ranges: Vec<RangeParams>,
}

/// Rangos cuyos commits mencionan una issue key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRanges {
    pub issue_key: String,
    pub ranges: Vec<RangeParams>,
}

/// POST /rest/api/1/repository/search-issues-in-ranges
///
/// Una entrada por issue key pedida, en el orden del request.
#[instrument(skip_all, fields(request_id = %request_id, ranges = request.ranges.len()))]
pub async fn search_issues_in_ranges(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Json(request): Json<SearchIssuesRequest>,
) -> Result<Json<Value>, AppError> {
    if let Some(bad) = request.issue_keys.iter().find(|k| !is_issue_key(k)) {
        return Err(FacadeError::invalid_argument(format!("'{}' is not an issue key", bad)).into());
    }
    let queries = request
        .ranges
        .iter()
        .map(RangeParams::range_query)
        .collect::<facade_core::Result<Vec<_>>>()?;

    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            let mut matches: BTreeMap<&str, Vec<RangeParams>> = BTreeMap::new();
            for (range, query) in request.ranges.iter().zip(&queries) {
                let commits = resolve_range(&state, &range.ssh_url, query).await?;
                let mentioned: BTreeSet<String> = mentioned_keys(&commits).into_iter().collect();
                for key in &request.issue_keys {
                    if mentioned.contains(key) {
                        matches.entry(key.as_str()).or_default().push(range.clone());
                    }
                }
            }
            Ok(request
                .issue_keys
                .iter()
                .map(|key| IssueRanges {
                    issue_key: key.clone(),
                    ranges: matches.get(key.as_str()).cloned().unwrap_or_default(),
                })
                .collect::<Vec<_>>())
        })
        .await?;
    Ok(Json(value))
}

/// GET /rest/api/1/repository/find/{issueKey}
///
/// Consulta el indice, no los backends.
#[instrument(skip_all, fields(request_id = %request_id, issue_key = %issue_key))]
pub async fn find_issue(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Path(issue_key): Path<String>,
) -> Result<Json<Value>, AppError> {
    let jobs = state.jobs.clone();
    let value = jobs
        .process(&request_id, move || async move {
            state.index.find_issue(&issue_key).await
        })
        .await?;
    Ok(Json(value))
}

async fn resolve_range(
    state: &AppState,
    ssh_url: &str,
    query: &RangeQuery,
) -> facade_core::Result<Vec<Commit>> {
    let (client, repository) = state.resolve_repository(ssh_url).await?;
    RangeResolver::new(client.as_ref())
        .resolve(&repository, query)
        .await
}

fn mentioned_keys(commits: &[Commit]) -> Vec<String> {
    commits
        .iter()
        .flat_map(|c| issue_keys(&c.message))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use facade_core::User;

    fn commit(hash: &str, message: &str) -> Commit {
        Commit::new(
            "repo",
            hash,
            message,
            chrono::Utc::now(),
            User::new("dev"),
            vec![],
            "",
        )
    }

    #[test]
    fn test_mentioned_keys_are_unique_and_sorted() {
        let commits = vec![
            commit("a", "PAY-2 and BILL-10"),
            commit("b", "BILL-10 again"),
            commit("c", "no keys here"),
        ];
        assert_eq!(mentioned_keys(&commits), vec!["BILL-10", "PAY-2"]);
    }
}

//! Request handlers for the `/api/github/*` proxy endpoints

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::archive::{DEFAULT_DISPLAY_NAME, DownloadedArchive, attachment_disposition};
use crate::error::Error;
use crate::github::{DEFAULT_PER_PAGE, GithubClient, MAX_PER_PAGE};
use crate::services;

/// Shared server state, immutable after startup
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<GithubClient>,
}

impl AppState {
    pub fn new(client: GithubClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

/// Error answered as `{"error": "<message>"}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// An upstream service failed while serving the request
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_download(err: Error) -> Self {
        if err.is_user_error() {
            ApiError::BadRequest("Unable to parse repository owner/name from URL".to_string())
        } else {
            ApiError::BadGateway(format!("Failed to download repository: {}", err))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}: {}", status, self);
        } else {
            tracing::debug!("{}: {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub repo_url: Option<String>,
    pub repo_name: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBody {
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub repo_name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchesQuery {
    pub repo_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BranchesResponse {
    pub branches: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn query_or_bad_request<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(inner)| inner)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// `GET /api/github/download?repoUrl=&repoName=&branch=`
pub async fn download_get(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let query = query_or_bad_request(query)?;
    let repo_url = non_blank(query.repo_url)
        .ok_or_else(|| ApiError::BadRequest("repoUrl is required".to_string()))?;
    let repo_name = non_blank(query.repo_name).unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

    serve_archive(&state, &repo_url, &repo_name, non_blank(query.branch)).await
}

/// `POST /api/github/download` with `{repoUrl, repoName, branch?}`
pub async fn download_post(
    State(state): State<AppState>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body.map_err(|rejection| {
        tracing::debug!("Rejected download body: {}", rejection.body_text());
        ApiError::BadRequest("Repository URL and name are required".to_string())
    })?;

    let (Some(repo_url), Some(repo_name)) = (non_blank(body.repo_url), non_blank(body.repo_name)) else {
        return Err(ApiError::BadRequest(
            "Repository URL and name are required".to_string(),
        ));
    };

    serve_archive(&state, &repo_url, &repo_name, non_blank(body.branch)).await
}

async fn serve_archive(
    state: &AppState,
    repo_url: &str,
    repo_name: &str,
    branch: Option<String>,
) -> ApiResult<Response> {
    tracing::info!("Download requested: {} (branch {:?})", repo_url, branch);

    let archive = services::download_repository_archive(&state.client, repo_url, repo_name, branch, |_| {})
        .await
        .map_err(ApiError::from_download)?;

    archive_response(archive, repo_name)
}

fn archive_response(archive: DownloadedArchive, repo_name: &str) -> ApiResult<Response> {
    let disposition = HeaderValue::from_str(&attachment_disposition(repo_name))
        .map_err(|e| ApiError::Internal(format!("Invalid archive file name: {}", e)))?;

    tracing::info!(
        "Serving {} ({} bytes, branch {}, {})",
        archive.file_name,
        archive.bytes.len(),
        archive.branch,
        archive.source
    );

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static("application/zip")),
        (CONTENT_DISPOSITION, disposition),
        (CACHE_CONTROL, HeaderValue::from_static("no-store")),
        (CONTENT_LENGTH, HeaderValue::from(archive.bytes.len())),
    ];
    Ok((StatusCode::OK, headers, archive.bytes).into_response())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: Option<String>) -> ApiResult<Option<T>> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {} parameter: {}", name, raw))),
    }
}

/// `GET /api/github/search?q=&page=&per_page=`
pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let query = query_or_bad_request(query)?;
    let q = non_blank(query.q)
        .ok_or_else(|| ApiError::BadRequest("Query parameter is required".to_string()))?;

    let page = parse_number::<u32>("page", query.page)?.unwrap_or(1).max(1);
    let per_page = parse_number::<u64>("per_page", query.per_page)?
        .unwrap_or(DEFAULT_PER_PAGE as u64)
        .clamp(1, MAX_PER_PAGE as u64) as u8;

    let results = services::search_repository_page(&state.client, &q, page, per_page)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to search repositories: {}", e)))?;

    Ok(Json(results))
}

/// `GET /api/github/trending`
pub async fn trending(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let repositories = services::trending_repositories(&state.client)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to fetch trending repositories: {}", e)))?;

    Ok(Json(repositories))
}

/// `GET /api/github/branches?repoUrl=`
pub async fn branches(
    State(state): State<AppState>,
    query: Result<Query<BranchesQuery>, QueryRejection>,
) -> ApiResult<Json<BranchesResponse>> {
    let query = query_or_bad_request(query)?;
    let repo_url = non_blank(query.repo_url)
        .ok_or_else(|| ApiError::BadRequest("repoUrl is required".to_string()))?;

    let branches = services::list_repository_branches(&state.client, &repo_url)
        .await
        .map_err(ApiError::from_download)?;

    Ok(Json(BranchesResponse { branches }))
}

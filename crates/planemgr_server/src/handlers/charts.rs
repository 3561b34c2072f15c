use crate::auth::{Authorizer, bearer_token, unauthorized};
use crate::locks::ChartLocks;
use axum::{
    Router,
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use planemgr_core::chart::{ChartStore, FileUpdate};
use planemgr_core::error::{ErrorKind, PlanemgrError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for chart handlers
#[derive(Clone)]
pub struct ChartsState {
    pub store: Arc<ChartStore>,
    pub locks: Arc<ChartLocks>,
    pub auth: Arc<dyn Authorizer>,
}

/// Chart index response
#[derive(Debug, Serialize)]
pub struct ChartListResponse {
    pub charts: Vec<String>,
}

/// Created chart response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChartResponse {
    pub chart_id: String,
}

/// Tree listing response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeResponse {
    pub resolved_ref: String,
    pub files: Vec<String>,
}

/// Single file response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub resolved_ref: String,
    pub path: String,
    pub content: String,
}

/// Commit hash response for file writes
#[derive(Debug, Serialize)]
pub struct WriteFilesResponse {
    pub commit: String,
}

/// Core error wrapped for HTTP, mapped by its kind.
pub struct ApiError(PlanemgrError);

impl From<PlanemgrError> for ApiError {
    fn from(err: PlanemgrError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("chart request failed: {}", self.0);
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Create chart routes, all gated by the authorizer in `state`
pub fn chart_routes(state: ChartsState) -> Router {
    Router::new()
        .route("/chart", get(list_charts).post(create_chart))
        .route(
            "/chart/{chart_id}",
            get(read_chart).head(chart_exists).put(write_chart_files),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

async fn require_auth(State(state): State<ChartsState>, request: Request, next: Next) -> Response {
    if !state.auth.is_authorized(bearer_token(request.headers())) {
        return unauthorized();
    }
    next.run(request).await
}

/// GET /api/chart - List known chart ids
async fn list_charts(State(state): State<ChartsState>) -> impl IntoResponse {
    match state.store.list() {
        Ok(charts) => Json(ChartListResponse { charts }).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// POST /api/chart - Create a new empty chart
async fn create_chart(State(state): State<ChartsState>) -> impl IntoResponse {
    match state.store.create() {
        Ok(chart_id) => {
            info!("created chart {}", chart_id);
            (StatusCode::CREATED, Json(CreateChartResponse { chart_id })).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// HEAD /api/chart/:chart_id - Probe whether a chart exists
async fn chart_exists(
    State(state): State<ChartsState>,
    axum::extract::Path(chart_id): axum::extract::Path<String>,
) -> impl IntoResponse {
    if state.store.exists(&chart_id) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Deserialize)]
struct ReadChartQuery {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    path: Option<String>,
}

/// GET /api/chart/:chart_id - List files at a ref, or read one file via ?path=
async fn read_chart(
    State(state): State<ChartsState>,
    axum::extract::Path(chart_id): axum::extract::Path<String>,
    Query(query): Query<ReadChartQuery>,
) -> impl IntoResponse {
    let git_ref = query.git_ref.as_deref().filter(|r| !r.is_empty());
    let path = query.path.as_deref().filter(|p| !p.is_empty());

    match path {
        Some(path) => match state.store.read_file(&chart_id, path, git_ref) {
            Ok(file) => Json(FileResponse {
                resolved_ref: file.resolved_ref,
                path: file.path,
                content: file.content,
            })
            .into_response(),
            Err(e) => ApiError::from(e).into_response(),
        },
        None => match state.store.list_tree(&chart_id, git_ref) {
            Ok(listing) => Json(TreeResponse {
                resolved_ref: listing.resolved_ref,
                files: listing.files,
            })
            .into_response(),
            Err(e) => ApiError::from(e).into_response(),
        },
    }
}

#[derive(Debug, Deserialize)]
struct WriteFilesRequest {
    message: String,
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    path: String,
    content: String,
}

/// PUT /api/chart/:chart_id - Commit a batch of file writes
async fn write_chart_files(
    State(state): State<ChartsState>,
    axum::extract::Path(chart_id): axum::extract::Path<String>,
    Json(body): Json<WriteFilesRequest>,
) -> impl IntoResponse {
    let updates: Vec<FileUpdate> = body
        .files
        .into_iter()
        .map(|f| FileUpdate::new(f.path, f.content))
        .collect();

    // One writer per chart at a time; other charts stay unaffected.
    let _lease = state.locks.acquire(&chart_id).await;
    match state.store.write_files(&chart_id, &updates, &body.message) {
        Ok(commit) => {
            info!(
                "chart {}: committed {} file(s) as {}",
                chart_id,
                updates.len(),
                commit
            );
            Json(WriteFilesResponse { commit }).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

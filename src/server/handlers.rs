use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::dashboard::ViewState;
use crate::error::Error;
use crate::models::{
    AnalysisReport, ClusterAssignment, CommitSentiment, DashboardOverview, ForecastSeries,
    PersonaTitle, VariantResponse,
};
use crate::server::state::ApiState;

const LONG_POLL: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Maps the crate error onto an HTTP status and JSON body.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Busy | Error::CacheMismatch { .. } => StatusCode::CONFLICT,
            Error::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::InsufficientData { .. } | Error::InvalidArgument(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AnalysisTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Network { .. } | Error::ModelServer(_) | Error::GitHubApi(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Cancelled => StatusCode::GONE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }

        let retry_after = self.0.retry_after().map(|d| d.as_secs().max(1));
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            retry_after_secs: retry_after,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub version: u64,
    pub view: ViewState,
}

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    #[serde(default)]
    pub after: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub use_cache: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisRequest {
    pub variants: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClusterRequest {
    pub k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastRequest {
    pub horizon_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadmeTipsRequest {
    pub repository: String,
    pub variant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadmeTipsResponse {
    pub repository: String,
    pub tips: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "gitdash"
    }))
}

pub async fn create_session(
    State(state): State<ApiState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let session = state.registry.create(request.username).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            id: session.id(),
            username: session.username().to_string(),
        }),
    ))
}

pub async fn close_session(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.registry.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_state(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult<StateResponse> {
    let session = state.registry.get(id).await?;
    let (view, version) = session.view().await;
    Ok(Json(StateResponse { version, view }))
}

/// Long-poll: answers once the state version passes `after`, or with the
/// unchanged state after the poll window. Closing the session ends the
/// poll with 410.
pub async fn wait_for_changes(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChangesQuery>,
) -> ApiResult<StateResponse> {
    let session = state.registry.get(id).await?;

    if let Ok(waited) = tokio::time::timeout(LONG_POLL, session.wait_for_version(query.after)).await {
        waited?;
    }

    let (view, version) = session.view().await;
    Ok(Json(StateResponse { version, view }))
}

pub async fn fetch(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    body: Option<Json<FetchRequest>>,
) -> ApiResult<StateResponse> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let session = state.registry.get(id).await?;

    if request.use_cache {
        session.load_cached().await?;
    } else {
        session.fetch().await?;
    }

    let (view, version) = session.view().await;
    Ok(Json(StateResponse { version, view }))
}

pub async fn run_analysis(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    body: Option<Json<AnalysisRequest>>,
) -> ApiResult<AnalysisReport> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let session = state.registry.get(id).await?;
    Ok(Json(session.analyze(request.variants).await?))
}

pub async fn run_clustering(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ClusterRequest>>,
) -> ApiResult<ClusterAssignment> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let session = state.registry.get(id).await?;
    Ok(Json(session.cluster(request.k).await?))
}

pub async fn run_forecast(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ForecastRequest>>,
) -> ApiResult<ForecastSeries> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let session = state.registry.get(id).await?;
    Ok(Json(session.forecast(request.horizon_days).await?))
}

pub async fn compare_models(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CompareRequest>,
) -> ApiResult<Vec<VariantResponse>> {
    let session = state.registry.get(id).await?;
    Ok(Json(session.compare(&request.prompt).await?))
}

pub async fn readme_tips(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReadmeTipsRequest>,
) -> ApiResult<ReadmeTipsResponse> {
    let session = state.registry.get(id).await?;
    let tips = session
        .readme_tips(&request.repository, request.variant.as_deref())
        .await?;
    Ok(Json(ReadmeTipsResponse {
        repository: request.repository,
        tips,
    }))
}

pub async fn persona(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult<PersonaTitle> {
    let session = state.registry.get(id).await?;
    Ok(Json(session.persona().await?))
}

pub async fn latest_commit_sentiment(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CommitSentiment> {
    let session = state.registry.get(id).await?;
    Ok(Json(session.latest_commit_sentiment().await?))
}

pub async fn overview(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult<DashboardOverview> {
    let session = state.registry.get(id).await?;
    Ok(Json(session.overview().await?))
}

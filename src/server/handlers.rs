use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::AppState;
use crate::error::Error;
use crate::query::DashboardQuery;

/// Error response: `{ "error": <message> }`. Upstream detail is logged, never
/// sent to the client.
pub(crate) struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::MissingParameter(name) => {
                (StatusCode::BAD_REQUEST, format!("{name} is required"))
            }
            Error::RangeTooLong { max, .. } => (
                StatusCode::BAD_REQUEST,
                format!("range is longer than {max} days"),
            ),
            Error::InvalidQuery(detail) => {
                log::debug!("rejected query string: {detail}");
                (StatusCode::BAD_REQUEST, "invalid query string".to_string())
            }
            Error::UpstreamUnavailable { .. } => {
                log::error!("{}", self.0);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "upstream unavailable".to_string(),
                )
            }
            other => {
                log::error!("request failed: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// `Query` whose rejection uses the JSON error shape.
pub(crate) struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError(Error::InvalidQuery(rejection.body_text()))),
        }
    }
}

fn ok<T: Serialize>(value: T) -> ApiResult<T> {
    Ok(Json(value))
}

/// GET /healthz
pub(crate) async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/pipelines
pub(crate) async fn pipelines(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    ok(state.dash.pipelines().await?)
}

/// GET /api/users
pub(crate) async fn users(State(state): State<AppState>) -> ApiResult<serde_json::Value> {
    ok(state.dash.users().await?)
}

/// GET /api/metrics?range&from&to&pipeline_id&user_id
pub(crate) async fn metrics(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<DashboardQuery>,
) -> ApiResult<crate::SummaryMetrics> {
    ok(state.dash.metrics(&q).await?)
}

/// GET /api/funnels?pipeline_id&range&from&to
pub(crate) async fn funnels(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<DashboardQuery>,
) -> ApiResult<Vec<crate::FunnelStage>> {
    ok(state.dash.funnels(&q).await?)
}

/// GET /api/timeseries?metric&range&from&to&pipeline_id&user_id
pub(crate) async fn timeseries(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<DashboardQuery>,
) -> ApiResult<Vec<crate::SeriesPoint>> {
    ok(state.dash.timeseries(&q).await?)
}

/// GET /api/tasks?user_id
pub(crate) async fn tasks(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<DashboardQuery>,
) -> ApiResult<crate::TaskBuckets> {
    ok(state.dash.tasks(&q).await?)
}

pub(crate) async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use serde::Serialize;
use uuid::Uuid;

use trove_service::{ItemRecord, SearchRequest, ServiceError};

use crate::auth::{self, OrgContext};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/items/search", post(search))
        .route("/v1/items/{id}", get(fetch_item))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn search(
    State(state): State<AppState>,
    Extension(org): Extension<OrgContext>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Vec<ItemRecord>>, ApiError> {
    let response = state.service.search(org.organization_id, payload).await?;
    Ok(Json(response))
}

async fn fetch_item(
    State(state): State<AppState>,
    Extension(org): Extension<OrgContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemRecord>, ApiError> {
    let response = state.service.fetch_item(org.organization_id, id).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_code: String,
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_code: String,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(status, code, message)
}

pub fn unauthorized() -> ApiError {
    json_error(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "A valid bearer token is required.",
    )
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { message } => {
                json_error(StatusCode::NOT_FOUND, "not_found", message)
            }
            ServiceError::Storage { message } => {
                // Store failures surface as an opaque server error; details
                // stay in the logs.
                tracing::error!(error = %message, "Request failed against the store.");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "The request could not be completed.",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error_code: self.error_code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

//! API v0 endpoints.
//!
//! Version 0 signals an unstable API -- breaking changes are expected
//! until the alarm reaches 1.0.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::server::SharedState;
use crate::alarm::AlarmError;
use crate::api_client::types::{AlarmSnapshot, ErrorBody, ErrorKind, ScheduleRequest};
use crate::service::CommandError;

/// Build the v0 API routes with OpenAPI metadata.
pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(get_alarm, schedule_alarm, cancel_alarm))
        .routes(routes!(request_dismissal))
        .routes(routes!(submit_photo))
}

/// An error rendered as a JSON [`ErrorBody`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                kind,
                message: message.into(),
            },
        }
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        let message = err.to_string();
        let (status, kind) = match err {
            CommandError::Alarm(AlarmError::InvalidTime { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorKind::InvalidTime)
            }
            CommandError::Alarm(AlarmError::InvalidState { .. }) => {
                (StatusCode::CONFLICT, ErrorKind::InvalidState)
            }
            CommandError::Alarm(AlarmError::VerificationFailed) => {
                (StatusCode::FORBIDDEN, ErrorKind::VerificationFailed)
            }
            CommandError::Alarm(AlarmError::VerificationService(_)) => {
                (StatusCode::BAD_GATEWAY, ErrorKind::VerificationService)
            }
            CommandError::Alarm(AlarmError::Playback(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Playback)
            }
            CommandError::Stopped => (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::Unavailable),
        };
        Self::new(status, kind, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult = Result<Json<AlarmSnapshot>, ApiError>;

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = OK, description = "Server is running", body = String),
    ),
)]
async fn health() -> &'static str {
    "OK"
}

/// Return the current alarm state.
#[utoipa::path(
    get,
    path = "/alarm",
    tag = "alarm",
    responses(
        (status = OK, description = "Current alarm state", body = AlarmSnapshot),
    ),
)]
async fn get_alarm(State(state): State<SharedState>) -> Json<AlarmSnapshot> {
    Json(state.alarm.snapshot())
}

/// Arm the alarm. The alarm must be idle.
#[utoipa::path(
    put,
    path = "/alarm",
    tag = "alarm",
    request_body = ScheduleRequest,
    responses(
        (status = OK, description = "Alarm armed", body = AlarmSnapshot),
        (status = UNPROCESSABLE_ENTITY, description = "Time not in the future", body = ErrorBody),
        (status = CONFLICT, description = "Alarm is not idle", body = ErrorBody),
    ),
)]
async fn schedule_alarm(
    State(state): State<SharedState>,
    Json(req): Json<ScheduleRequest>,
) -> ApiResult {
    Ok(Json(state.alarm.schedule(req.target_time).await?))
}

/// Cancel the armed alarm.
#[utoipa::path(
    delete,
    path = "/alarm",
    tag = "alarm",
    responses(
        (status = OK, description = "Alarm cancelled", body = AlarmSnapshot),
        (status = CONFLICT, description = "Alarm is not armed", body = ErrorBody),
    ),
)]
async fn cancel_alarm(State(state): State<SharedState>) -> ApiResult {
    Ok(Json(state.alarm.cancel().await?))
}

/// Start dismissing a ringing alarm. A photo must follow.
#[utoipa::path(
    post,
    path = "/alarm/dismissal",
    tag = "alarm",
    responses(
        (status = OK, description = "Waiting for a photo", body = AlarmSnapshot),
        (status = CONFLICT, description = "Alarm is not ringing", body = ErrorBody),
    ),
)]
async fn request_dismissal(State(state): State<SharedState>) -> ApiResult {
    Ok(Json(state.alarm.request_dismiss().await?))
}

/// Submit a toothbrush photo to silence the alarm.
#[utoipa::path(
    post,
    path = "/alarm/dismissal/photo",
    tag = "alarm",
    request_body(
        content = Vec<u8>,
        content_type = "application/octet-stream",
        description = "Photo bytes (JPEG, PNG or WEBP)",
    ),
    responses(
        (status = OK, description = "Alarm dismissed", body = AlarmSnapshot),
        (status = BAD_REQUEST, description = "Empty photo", body = ErrorBody),
        (status = FORBIDDEN, description = "No toothbrush found", body = ErrorBody),
        (status = CONFLICT, description = "Dismissal was not requested", body = ErrorBody),
        (status = BAD_GATEWAY, description = "Verifier unavailable", body = ErrorBody),
    ),
)]
async fn submit_photo(State(state): State<SharedState>, photo: Bytes) -> ApiResult {
    if photo.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidRequest,
            "photo body is empty",
        ));
    }
    Ok(Json(state.alarm.attempt_dismiss(photo).await?))
}

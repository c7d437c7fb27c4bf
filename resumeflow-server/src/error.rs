use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use resumeflow::artifacts::ArtifactError;
use resumeflow::service::ServiceError;
use resumeflow::uploads::UploadError;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Job not found: {0}")]
    UnknownJobId(String),

    #[error("Uploaded resume not found: {0}")]
    UnknownUpload(String),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Value) {
        let message = self.to_string();
        match self {
            Self::Service(ServiceError::Validation(e)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                json!({ "message": message, "field": e.field }),
            ),
            Self::MalformedBody(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                json!({ "message": message }),
            ),
            Self::Service(ServiceError::Upload(UploadError::UnsupportedType(_))) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                json!({ "message": message }),
            ),
            Self::Service(ServiceError::Upload(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                json!({ "message": message, "field": "file" }),
            ),
            Self::Service(ServiceError::NotFound(_))
            | Self::UnknownJobId(_)
            | Self::UnknownUpload(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", json!({ "message": message }))
            }
            Self::Service(ServiceError::Artifact(
                ArtifactError::NotFound { .. } | ArtifactError::InvalidName(_),
            )) => (StatusCode::NOT_FOUND, "NOT_FOUND", json!({ "message": message })),
            Self::Service(ServiceError::Conflict { job_id, status, .. }) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                json!({ "message": message, "job_id": job_id, "status": status }),
            ),
            Self::Service(ServiceError::QueueFull(job_id)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "QUEUE_FULL",
                json!({ "message": message, "job_id": job_id }),
            ),
            Self::Service(ServiceError::ShuttingDown(job_id)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SHUTTING_DOWN",
                json!({ "message": message, "job_id": job_id }),
            ),
            Self::Service(ServiceError::Artifact(_) | ServiceError::Store(_)) => {
                tracing::error!(error = %message, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    json!({ "message": "An internal error occurred" }),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, mut detail) = self.parts();
        if let Value::Object(fields) = &mut detail {
            fields.insert("code".to_string(), Value::from(code));
        }
        (status, Json(json!({ "error": detail }))).into_response()
    }
}

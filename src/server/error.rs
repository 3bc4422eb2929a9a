//! Maps [`AegisError`] onto the control-plane's `{error: {kind, message}}`
//! response body (spec.md §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::domain::ports::errors::AegisError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

pub struct ApiError(pub AegisError);

impl From<AegisError> for ApiError {
    fn from(err: AegisError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AegisError::InvalidBrief(_) | AegisError::InvalidPath(_) | AegisError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            AegisError::NotFound(_) | AegisError::WorkspaceMissing(_) => StatusCode::NOT_FOUND,
            AegisError::SlotBusy(_) | AegisError::NotCancellable(_) | AegisError::AlreadyCancelled(_) | AegisError::AlreadyExists(_) => {
                StatusCode::CONFLICT
            }
            AegisError::FileTooLarge(..) => StatusCode::PAYLOAD_TOO_LARGE,
            AegisError::NoSlot | AegisError::CapacityExceeded => StatusCode::SERVICE_UNAVAILABLE,
            AegisError::IoFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody { error: ErrorDetail { kind: self.0.kind(), message: self.0.to_string() } };
        (status, Json(body)).into_response()
    }
}

//! Error responses for the REST API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{AnalyzerError, ErrorKind};

/// Body of every non-2xx response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler error: wraps an `AnalyzerError` and renders it as `{error}` JSON
#[derive(Debug)]
pub struct ApiError(pub AnalyzerError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!(status = status.as_u16(), "{}", self.0);
        }

        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

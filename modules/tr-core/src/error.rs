//! The workspace's single error type, and its mapping onto the stable
//! `{code, message, detail?}` API error shape from spec.md §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A plain entity id matched rows in more than one system (spec.md §8
    /// property 11 / scenario S6). Carries candidates for the client to
    /// disambiguate with a composite id instead of guessing.
    #[error("ambiguous id: {message}")]
    Ambiguous {
        message: String,
        candidates: Vec<AmbiguousCandidate>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("identity resolution failed: {0}")]
    IdentityResolution(String),

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("request timed out")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TrResult<T> = std::result::Result<T, TrError>;

#[derive(Debug, Clone, Serialize)]
pub struct AmbiguousCandidate {
    pub system_id: uuid::Uuid,
    pub system_name: String,
    pub sysid: Option<i64>,
}

#[derive(Serialize)]
struct ApiError {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl TrError {
    fn code(&self) -> &'static str {
        match self {
            TrError::NotFound(_) => "not_found",
            TrError::Ambiguous { .. } => "ambiguous_id",
            TrError::InvalidRequest(_) => "invalid_request",
            TrError::Unauthorized => "unauthorized",
            TrError::Forbidden => "forbidden",
            TrError::IdentityResolution(_) => "identity_resolution_failed",
            TrError::MergeFailed(_) => "merge_failed",
            TrError::QueryRejected(_) => "query_rejected",
            TrError::Timeout => "timeout",
            TrError::Storage(_) => "storage_error",
            TrError::Other(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            TrError::NotFound(_) => StatusCode::NOT_FOUND,
            TrError::Ambiguous { .. } => StatusCode::CONFLICT,
            TrError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            TrError::Unauthorized => StatusCode::UNAUTHORIZED,
            TrError::Forbidden => StatusCode::FORBIDDEN,
            TrError::IdentityResolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TrError::MergeFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TrError::QueryRejected(_) => StatusCode::BAD_REQUEST,
            TrError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            TrError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TrError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TrError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            TrError::Ambiguous { candidates, .. } => {
                Some(serde_json::json!({ "candidates": candidates }))
            }
            TrError::Storage(e) => {
                tracing::error!(error = %e, "storage error surfaced to API");
                None
            }
            TrError::Other(e) => {
                tracing::error!(error = %e, "internal error surfaced to API");
                None
            }
            _ => None,
        };
        let body = ApiError {
            code: self.code(),
            message: self.to_string(),
            detail,
        };
        (status, Json(body)).into_response()
    }
}

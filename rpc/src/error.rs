//! RPC error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sacco_engine::SaccoError;
use sacco_types::TypeError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Engine(#[from] SaccoError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("server error: {0}")]
    Server(String),
}

impl From<TypeError> for RpcError {
    fn from(e: TypeError) -> Self {
        RpcError::InvalidRequest(e.to_string())
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl RpcError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            RpcError::Engine(e) => match e {
                SaccoError::AlreadyMember => (StatusCode::CONFLICT, "ALREADY_MEMBER"),
                SaccoError::GroupFull { .. } => (StatusCode::CONFLICT, "GROUP_FULL"),
                SaccoError::NotApprovedMember => (StatusCode::FORBIDDEN, "NOT_APPROVED_MEMBER"),
                SaccoError::Unauthorized(_) => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
                SaccoError::MemberNotFound => (StatusCode::NOT_FOUND, "MEMBER_NOT_FOUND"),
                SaccoError::GroupNotFound(_) => (StatusCode::NOT_FOUND, "GROUP_NOT_FOUND"),
                SaccoError::LoanNotFound(_) => (StatusCode::NOT_FOUND, "LOAN_NOT_FOUND"),
                SaccoError::InsufficientBalance { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BALANCE")
                }
                SaccoError::InvalidAmount(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_AMOUNT"),
                SaccoError::InvalidTerms(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TERMS"),
                SaccoError::InvalidThreshold(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_THRESHOLD")
                }
                SaccoError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
                SaccoError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            },
            RpcError::InvalidRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_REQUEST"),
            RpcError::Server(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_ERROR"),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

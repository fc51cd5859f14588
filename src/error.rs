use crate::orchestration::{CloseError, SubmitError, WalletError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::InProgress => AppError::Conflict(err.to_string()),
            SubmitError::Chain(_) => AppError::Upstream("Market order canceled".into()),
            other => AppError::Precondition(other.to_string()),
        }
    }
}

impl From<CloseError> for AppError {
    fn from(err: CloseError) -> Self {
        match err {
            CloseError::InProgress(_) => AppError::Conflict(err.to_string()),
            CloseError::UnknownPosition(_) => AppError::NotFound(err.to_string()),
            CloseError::Chain(_) => AppError::Upstream("Position close failed".into()),
            other => AppError::Precondition(other.to_string()),
        }
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::UnknownAccount(_) => AppError::NotFound(err.to_string()),
            WalletError::Chain(e) => {
                warn!(error = %e, "Account selection failed");
                AppError::Upstream("Account selection failed".into())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Precondition(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;

    #[test]
    fn test_chain_failures_hide_detail() {
        let err: AppError = SubmitError::Chain(ChainError::Rpc("node 10.0.0.3 timed out".into())).into();
        match err {
            AppError::Upstream(msg) => assert_eq!(msg, "Market order canceled"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wallet_chain_failure_hides_detail() {
        let err = AppError::from(WalletError::Chain(ChainError::Rpc("GetVault failed".into())));
        match err {
            AppError::Upstream(msg) => assert_eq!(msg, "Account selection failed"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_status_codes() {
        let resp = AppError::from(SubmitError::MissingOpenPrice).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let resp = AppError::from(CloseError::UnknownPosition(3)).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = AppError::from(CloseError::InProgress(3)).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}

//! Response mapping for contract outcomes

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use defensive::ContractError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a successful call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub result: Value,
}

/// A failed contract call, answered with its error report
#[derive(Debug)]
pub struct HttpError(pub ContractError);

impl HttpError {
    pub fn status_code(&self) -> StatusCode {
        if self.0.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<ContractError> for HttpError {
    fn from(err: ContractError) -> Self {
        HttpError(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self.0,
                chain = ?self.0.signatures(),
                "Contract call failed"
            );
        }
        (status, Json(self.0.report())).into_response()
    }
}

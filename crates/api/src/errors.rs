//! Error → HTTP response mapping.
//!
//! Every error leaves the process as `{"success": false, "message": ...}`;
//! denials additionally carry `required`, `missing` and `userHas` so clients
//! can explain the denial to the operator.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use mesa_auth::{AccessDenied, AuthzError};
use mesa_store::AccountError;

/// A fully-mapped API error, ready to serialize.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    denied: Option<AccessDenied>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            denied: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.denied {
            Some(denied) => json!({
                "success": false,
                "message": self.message,
                "required": denied.required,
                "missing": denied.missing,
                "userHas": denied.user_has,
            }),
            None => json!({
                "success": false,
                "message": self.message,
            }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthzError> for ApiError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::Unauthenticated => Self::new(StatusCode::UNAUTHORIZED, e.to_string()),
            AuthzError::InvalidRole => Self::new(StatusCode::FORBIDDEN, e.to_string()),
            AuthzError::Forbidden(denied) => Self {
                status: StatusCode::FORBIDDEN,
                message: format!("access denied, {denied}"),
                denied: Some(denied),
            },
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        use AccountError::*;
        let status = match &e {
            InvalidCredentials | AccountDeactivated | AccountNotVerified | AccountLocked => {
                StatusCode::UNAUTHORIZED
            }
            AdminUndeletable | SelfDeletion | AdminAccountProtected => StatusCode::FORBIDDEN,
            UnknownRole(_) | UnknownPermission(_) | Otp(_) | Validation(_) | Password(_) => {
                StatusCode::BAD_REQUEST
            }
            AccountNotFound => StatusCode::NOT_FOUND,
            EmailTaken => StatusCode::CONFLICT,
            Token(_) | Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal detail goes to the log, not the client.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %e, "internal error serving request");
            return Self::new(status, "internal server error");
        }

        Self::new(status, e.to_string())
    }
}

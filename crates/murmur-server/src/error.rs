use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use murmur_shared::protocol::{ErrorPayload, ServerEvent};
use murmur_shared::ProtocolError;
use murmur_store::StoreError;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cooldown active, retry in {remaining_secs} seconds")]
    Cooldown { remaining_secs: i64 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Stable short code used in the live `error` event.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Validation(_) => "validation",
            ServerError::NotFound(_) => "not_found",
            ServerError::Conflict(_) => "conflict",
            ServerError::Cooldown { .. } => "cooldown",
            ServerError::Forbidden(_) => "forbidden",
            ServerError::Unauthorized(_) => "unauthorized",
            ServerError::Persistence(_) => "persistence",
            ServerError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Cooldown { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Persistence(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to a client. Store and internal details stay in
    /// the logs.
    fn public_message(&self) -> String {
        match self {
            ServerError::Persistence(_) => "Storage error".to_string(),
            ServerError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// The live-channel form of this error, for the originating session only.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error(ErrorPayload {
            code: self.code().to_string(),
            message: self.public_message(),
        })
    }
}

impl From<ProtocolError> for ServerError {
    fn from(e: ProtocolError) -> Self {
        ServerError::Validation(e.to_string())
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        ServerError::Unauthorized(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match &self {
            ServerError::Persistence(e) => tracing::error!(error = %e, "Store operation failed"),
            ServerError::Internal(e) => tracing::error!(error = %e, "Internal error"),
            _ => {}
        }

        let body = serde_json::json!({
            "error": self.public_message(),
        });

        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServerError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ServerError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ServerError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ServerError::Cooldown { remaining_secs: 5 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ServerError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ServerError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServerError::Persistence(StoreError::NotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_event_hides_store_details() {
        let err = ServerError::Persistence(StoreError::Invalid("row 7 is corrupt".into()));
        let ServerEvent::Error(payload) = err.to_event() else {
            panic!("expected error event");
        };
        assert_eq!(payload.code, "persistence");
        assert!(!payload.message.contains("row 7"));
    }

    #[test]
    fn test_protocol_error_is_validation() {
        let err: ServerError = ProtocolError::MissingField("to").into();
        assert_eq!(err.code(), "validation");
    }
}

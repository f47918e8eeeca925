use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use docdesk_console::ConsoleError;
use docdesk_engine::EngineError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Console(#[from] ConsoleError),

    /// Malformed request input (for example, document content that is not
    /// a JSON object).
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Console(e) => match e {
                ConsoleError::NotFound(_)
                | ConsoleError::Engine(EngineError::DocumentNotFound(_)) => StatusCode::NOT_FOUND,
                ConsoleError::Validation(_)
                | ConsoleError::AlreadyRegistered(_)
                | ConsoleError::Engine(EngineError::InvalidDocument(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let not_found = ServerError::from(ConsoleError::NotFound("x".into()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid = ServerError::from(ConsoleError::Validation("x".into()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let engine = ServerError::from(ConsoleError::Engine(EngineError::ReadOnly));
        assert_eq!(engine.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            ServerError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn console_message_is_kept() {
        let err = ServerError::from(ConsoleError::NotFound("people".into()));
        assert_eq!(err.to_string(), "database not found: people");
    }
}

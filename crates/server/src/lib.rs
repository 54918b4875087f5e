//! Tutor Server
//!
//! HTTP API over the tutoring orchestrator with in-memory stores.

pub mod http;
pub mod metrics;
pub mod state;
pub mod store;

pub use http::create_router;
pub use metrics::{init_metrics, record_error, record_request};
pub use state::AppState;
pub use store::{InMemoryConversationStore, InMemoryMessageStore, InMemoryUserDirectory};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tutor_core::Error> for ServerError {
    fn from(err: tutor_core::Error) -> Self {
        match err {
            tutor_core::Error::NotFound(msg) => ServerError::NotFound(msg),
            tutor_core::Error::Validation(msg) => ServerError::InvalidRequest(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<tutor_agent::AgentError> for ServerError {
    fn from(err: tutor_agent::AgentError) -> Self {
        match err {
            tutor_agent::AgentError::ConversationNotFound(id) => {
                ServerError::NotFound(format!("conversation {}", id))
            }
            tutor_agent::AgentError::Core(e) => e.into(),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            record_error("internal");
        }
        (
            status,
            Json(serde_json::json!({
                "success": false,
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}

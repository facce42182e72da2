//! Error types and JSON error responses for the dashboard.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// The session controller is gone or did not answer.
    #[error("Session unavailable: {0}")]
    Session(#[from] SessionError),

    /// Binding the listener failed.
    #[error("Failed to bind dashboard to '{addr}': {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid bind address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// The HTTP server stopped with an error.
    #[error("Dashboard server error: {0}")]
    Serve(#[source] std::io::Error),
}

impl DashboardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::Session(SessionError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            DashboardError::Session(SessionError::Disconnected) => StatusCode::SERVICE_UNAVAILABLE,
            DashboardError::Bind { .. }
            | DashboardError::InvalidAddress { .. }
            | DashboardError::Serve(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            DashboardError::Session(SessionError::Timeout) => "session_timeout",
            DashboardError::Session(SessionError::Disconnected) => "session_unavailable",
            DashboardError::Bind { .. } => "bind_error",
            DashboardError::InvalidAddress { .. } => "invalid_address",
            DashboardError::Serve(_) => "server_error",
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
            }
        });

        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = self.status_code();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        response
    }
}

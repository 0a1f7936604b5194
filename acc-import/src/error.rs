use acc_api::AccApiError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid OAuth state.")]
    InvalidState,

    #[error("Missing OAuth code.")]
    MissingCode,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-2xx from the catalog, passed back with the original status and body.
    #[error("{context} ({status}): {details}")]
    Upstream {
        context: &'static str,
        status: u16,
        details: String,
    },

    #[error("OAuth error: {0}")]
    OAuthError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Wrap a catalog failure, keeping the upstream status when there is one.
    pub fn upstream(context: &'static str, err: AccApiError) -> Self {
        match err {
            AccApiError::Upstream { status, body } => ServerError::Upstream {
                context,
                status,
                details: body,
            },
            other => ServerError::Upstream {
                context,
                status: other.status().unwrap_or(502),
                details: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ServerError::InvalidState => {
                (StatusCode::BAD_REQUEST, "Invalid OAuth state.".to_string())
            }
            ServerError::MissingCode => (StatusCode::BAD_REQUEST, "Missing OAuth code.".to_string()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ServerError::Upstream {
                context,
                status,
                details,
            } => {
                let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                let body = Json(json!({
                    "error": context,
                    "status": status,
                    "details": details,
                }));
                return (code, body).into_response();
            }
            ServerError::OAuthError(msg) => (StatusCode::BAD_GATEWAY, msg),
            ServerError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl
    From<
        oauth2::RequestTokenError<
            reqwest::Error,
            oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>,
        >,
    > for ServerError
{
    fn from(
        err: oauth2::RequestTokenError<
            reqwest::Error,
            oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>,
        >,
    ) -> Self {
        ServerError::OAuthError(format!("Token request failed: {}", err))
    }
}

impl From<config::ConfigError> for ServerError {
    fn from(err: config::ConfigError) -> Self {
        ServerError::Configuration(format!("Configuration error: {}", err))
    }
}

impl From<crate::services::KvError> for ServerError {
    fn from(err: crate::services::KvError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<crate::services::StorageError> for ServerError {
    fn from(err: crate::services::StorageError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<crate::services::IndexError> for ServerError {
    fn from(err: crate::services::IndexError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<crate::pipeline::QueueError> for ServerError {
    fn from(err: crate::pipeline::QueueError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

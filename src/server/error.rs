use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

pub type AppResult<T> = Result<T, Error>;

/// boundary policy: upstream hiccups and malformed manifests never bubble out of the services,
/// they collapse to NotFound and the handler picks the status
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unexpected error occurred")]
    InternalServerError,

    #[error("{0}")]
    InternalServerErrorWithContext(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "unexpected error occurred".to_string(),
            ),
            Error::InternalServerErrorWithContext(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        if status.is_server_error() {
            error!("internal error returned to client: {}", message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

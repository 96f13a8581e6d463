use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use slideshow_core::{DeckError, Operation};

/// Failures of an API call, mapped onto HTTP responses
#[derive(Debug)]
pub enum ApiError {
    Forbidden(Operation),
    NotFound(String),
    Deck(DeckError),
    Internal(String),
}

impl From<DeckError> for ApiError {
    fn from(error: DeckError) -> Self {
        ApiError::Deck(error)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Forbidden(operation) => (
                StatusCode::FORBIDDEN,
                serde_json::json!({ "error": format!("Not allowed: {:?}", operation) }),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": format!("Not found: {}", what) }),
            ),
            ApiError::Deck(DeckError::Invalid(result)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({ "error": "Invalid input", "errors": result.errors }),
            ),
            ApiError::Deck(error @ DeckError::DuplicateName { .. }) => {
                (StatusCode::CONFLICT, serde_json::json!({ "error": error.to_string() }))
            }
            ApiError::Deck(error @ DeckError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, serde_json::json!({ "error": error.to_string() }))
            }
            ApiError::Deck(error) => {
                tracing::error!(%error, "invariant violated");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": error.to_string() }),
                )
            }
            ApiError::Internal(message) => {
                tracing::error!(%message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": message }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

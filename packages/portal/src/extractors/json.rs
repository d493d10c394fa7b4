use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

/// `Json<T>` whose rejections come back as `VALIDATION_ERROR` bodies.
pub struct AppJson<T>(pub T);

fn rejection_to_error(rejection: JsonRejection) -> AppError {
    debug!(status = %rejection.status(), "Rejected request body");
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            AppError::validation("Expected a JSON body with Content-Type: application/json")
        }
        JsonRejection::JsonSyntaxError(e) => {
            AppError::validation(format!("Malformed JSON: {}", e.body_text()))
        }
        other => AppError::validation(other.body_text()),
    }
}

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(rejection_to_error)
    }
}

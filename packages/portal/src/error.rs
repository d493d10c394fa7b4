use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `DUPLICATE`,
    /// `TOKEN_MISSING`, `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `PERMISSION_DENIED`,
    /// `NOT_FOUND`, `OTP_EXPIRED`, `OTP_MISMATCH`, `ATTEMPTS_EXCEEDED`, `RATE_LIMITED`,
    /// `SESSION_NOT_FOUND`, `SESSION_EXPIRED`, `STAGE_CLOSED`, `DEADLINE_PASSED`,
    /// `SUBMISSIONS_DISABLED`, `INVALID_TRANSITION`, `STORE_UNAVAILABLE`, `INTERNAL_ERROR`.
    #[schema(example = "DUPLICATE")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "mobile is already registered")]
    pub message: String,
    /// The single input field this error belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "mobile")]
    pub field: Option<&'static str>,
    /// Per-field messages when several inputs failed validation at once.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub fields: Option<BTreeMap<&'static str, String>>,
}

/// Application-level error type.
///
/// Every variant maps to exactly one status code and one `code` string, so
/// clients can branch on the code instead of parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        fields: Option<BTreeMap<&'static str, String>>,
    },
    #[error("{field} is already registered")]
    Duplicate { field: &'static str },
    #[error("Authentication required")]
    TokenMissing,
    #[error("Invalid or expired token")]
    TokenInvalid,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Insufficient permissions")]
    PermissionDenied,
    #[error("{0}")]
    NotFound(String),
    #[error("The code has expired. Request a new one")]
    OtpExpired,
    #[error("Incorrect code. {attempts_remaining} attempt(s) remaining")]
    OtpMismatch { attempts_remaining: i32 },
    #[error("Too many incorrect attempts. Request a new code")]
    AttemptsExceeded,
    /// Contains seconds until retry is allowed.
    #[error("Rate limit exceeded. Try again in {retry_after} seconds")]
    RateLimited { retry_after: u64 },
    #[error("Session not found")]
    SessionNotFound,
    #[error("Session expired. Please sign in again")]
    SessionExpired,
    #[error("This stage is not accepting submissions")]
    StageClosed,
    #[error("The submission deadline has passed")]
    DeadlinePassed,
    #[error("Submissions are not enabled for this applicant")]
    SubmissionsDisabled,
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("The data store is temporarily unavailable")]
    StoreUnavailable,
    #[error("An unexpected error occurred")]
    Internal(String),
}

impl AppError {
    /// A validation error not tied to a specific input.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            fields: None,
        }
    }

    /// A validation error attached to one input field.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            message: message.clone(),
            fields: Some(BTreeMap::from([(field, message)])),
        }
    }

    /// Fold collected field problems into one error, or `Ok` when there are none.
    pub fn from_fields(fields: BTreeMap<&'static str, String>) -> Result<(), Self> {
        if fields.is_empty() {
            return Ok(());
        }
        Err(AppError::Validation {
            message: format!(
                "Invalid input: {}",
                fields.keys().copied().collect::<Vec<_>>().join(", ")
            ),
            fields: Some(fields),
        })
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Duplicate { .. } => "DUPLICATE",
            AppError::TokenMissing => "TOKEN_MISSING",
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::PermissionDenied => "PERMISSION_DENIED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::OtpExpired => "OTP_EXPIRED",
            AppError::OtpMismatch { .. } => "OTP_MISMATCH",
            AppError::AttemptsExceeded => "ATTEMPTS_EXCEEDED",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::SessionNotFound => "SESSION_NOT_FOUND",
            AppError::SessionExpired => "SESSION_EXPIRED",
            AppError::StageClosed => "STAGE_CLOSED",
            AppError::DeadlinePassed => "DEADLINE_PASSED",
            AppError::SubmissionsDisabled => "SUBMISSIONS_DISABLED",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::StoreUnavailable => "STORE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::OtpExpired | AppError::OtpMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::TokenMissing
            | AppError::TokenInvalid
            | AppError::InvalidCredentials
            | AppError::SessionNotFound
            | AppError::SessionExpired => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied | AppError::SubmissionsDisabled => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Duplicate { .. }
            | AppError::StageClosed
            | AppError::DeadlinePassed
            | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::AttemptsExceeded | AppError::RateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Infrastructure failures that may succeed on a retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StoreUnavailable)
    }

    fn into_body(self) -> ErrorBody {
        if let AppError::Internal(detail) = &self {
            tracing::error!("Internal error: {}", detail);
        }
        let code = self.code();
        let message = self.to_string();
        let (field, fields) = match self {
            AppError::Duplicate { field } => (Some(field), None),
            AppError::Validation { fields, .. } => match fields {
                Some(map) if map.len() == 1 => (map.keys().next().copied(), Some(map)),
                other => (None, other),
            },
            _ => (None, None),
        };
        ErrorBody {
            code,
            message,
            field,
            fields,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = if let AppError::RateLimited { retry_after } = &self {
            Some(*retry_after)
        } else {
            None
        };

        let status = self.status();
        let body = self.into_body();

        if let Some(seconds) = retry_after {
            (status, [("Retry-After", seconds.to_string())], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
                tracing::warn!(error = %err, "Store unavailable");
                AppError::StoreUnavailable
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

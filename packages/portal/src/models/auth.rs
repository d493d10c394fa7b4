use crate::error::AppError;
use common::identity::is_valid_email;
use serde::{Deserialize, Serialize};

/// Request body for admin login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ops@hackathon.example")]
    pub email: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::field("email", "Email must not be empty"));
    }
    if payload.password.is_empty() {
        return Err(AppError::field("password", "Password must not be empty"));
    }
    Ok(())
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    #[schema(example = "ops@hackathon.example")]
    pub email: String,
    #[schema(example = "admin")]
    pub role: String,
    #[schema(example = json!(["applicant:manage", "submission:review"]))]
    pub permissions: Vec<String>,
}

/// Current authenticated admin.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "ops@hackathon.example")]
    pub email: String,
    #[schema(example = "admin")]
    pub role: String,
    #[schema(example = json!(["applicant:manage"]))]
    pub permissions: Vec<String>,
}

/// Request body for starting a password reset.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct PasswordResetRequest {
    #[schema(example = "ops@hackathon.example")]
    pub email: String,
}

/// Request body for completing a password reset.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct PasswordResetConfirm {
    #[schema(example = "ops@hackathon.example")]
    pub email: String,
    #[schema(example = "482913")]
    pub code: String,
    /// 8-128 characters.
    pub new_password: String,
}

pub fn validate_password_reset(payload: &PasswordResetConfirm) -> Result<(), AppError> {
    if !is_valid_email(payload.email.trim()) {
        return Err(AppError::field("email", "email must be a valid email address"));
    }
    if payload.new_password.len() < 8 || payload.new_password.len() > 128 {
        return Err(AppError::field(
            "new_password",
            "Password must be 8-128 characters",
        ));
    }
    Ok(())
}

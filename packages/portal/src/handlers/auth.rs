use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use common::OtpPurpose;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{debug, info, instrument};

use crate::entity::admin_user;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::auth::{
    LoginRequest, LoginResponse, MeResponse, PasswordResetConfirm, PasswordResetRequest,
    validate_login_request, validate_password_reset,
};
use crate::otp::OtpService;
use crate::state::AppState;
use crate::utils::{hash, jwt};

#[utoipa::path(
    post,
    path = "/admin/auth/login",
    tag = "Admin Auth",
    operation_id = "adminLogin",
    summary = "Sign in as an admin or jury member",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Wrong email or password (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;

    let email = payload.email.trim().to_lowercase();

    let user = admin_user::Entity::find()
        .filter(admin_user::Column::Email.eq(&email))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let is_valid = hash::verify_password(&payload.password, &user.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;

    if !is_valid {
        return Err(AppError::InvalidCredentials);
    }

    let permissions = admin_user::permissions_for(&user.role);

    let token = jwt::sign(
        user.id,
        &user.email,
        &user.role,
        permissions.clone(),
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_ttl_hours,
    )
    .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))?;

    Ok(Json(LoginResponse {
        token,
        email: user.email,
        role: user.role,
        permissions,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/auth/me",
    tag = "Admin Auth",
    operation_id = "adminMe",
    summary = "Current admin",
    responses(
        (status = 200, description = "Current admin", body = MeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(auth_user), fields(user_id = auth_user.user_id))]
pub async fn me(auth_user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: auth_user.user_id,
        email: auth_user.email,
        role: auth_user.role,
        permissions: auth_user.permissions,
    })
}

#[utoipa::path(
    post,
    path = "/admin/auth/password-reset/request",
    tag = "Admin Auth",
    operation_id = "requestPasswordReset",
    summary = "Mail a password reset code",
    description = "Always answers 202 for well-formed input, whether or not the email belongs to an account.",
    request_body = PasswordResetRequest,
    responses(
        (status = 202, description = "Request accepted"),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PasswordResetRequest>,
) -> Result<StatusCode, AppError> {
    let result = OtpService::new(&state.db, &state.config.otp, state.notifier.as_ref())
        .request(&payload.email, OtpPurpose::PasswordReset)
        .await;

    match result {
        Ok(_) => Ok(StatusCode::ACCEPTED),
        // Unknown accounts look the same as known ones
        Err(AppError::NotFound(_)) => {
            debug!("Password reset requested for unknown account");
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) => Err(e),
    }
}

#[utoipa::path(
    post,
    path = "/admin/auth/password-reset/confirm",
    tag = "Admin Auth",
    operation_id = "confirmPasswordReset",
    summary = "Set a new password with a reset code",
    request_body = PasswordResetConfirm,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong or expired code (OTP_MISMATCH, OTP_EXPIRED, VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "No active code (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Code locked (ATTEMPTS_EXCEEDED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    validate_password_reset(&payload)?;

    let verified = OtpService::new(&state.db, &state.config.otp, state.notifier.as_ref())
        .verify(&payload.email, OtpPurpose::PasswordReset, &payload.code)
        .await?;

    let password = hash::hash_password(&payload.new_password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let result = admin_user::Entity::update_many()
        .col_expr(admin_user::Column::Password, Expr::value(password))
        .filter(admin_user::Column::Email.eq(&verified.identifier))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Account not found".into()));
    }

    info!(otp_id = verified.otp_id, "Admin password reset");
    Ok(StatusCode::NO_CONTENT)
}

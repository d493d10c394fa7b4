use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use common::{ApplicantStatus, OtpPurpose};
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::applicant;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::applicant::ApplicantResponse;
use crate::models::otp::{OtpRequest, OtpRequestResponse, OtpVerifyRequest, OtpVerifyResponse};
use crate::otp::OtpService;
use crate::session::SessionService;
use crate::state::AppState;

/// The applicant endpoints only serve sign-in codes.
fn require_login_purpose(purpose: OtpPurpose) -> Result<(), AppError> {
    if purpose != OtpPurpose::Login {
        return Err(AppError::field(
            "purpose",
            "Only login codes can be requested here",
        ));
    }
    Ok(())
}

/// Session cookie carrying the raw token.
pub(crate) fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((state.config.session.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.session.secure_cookie)
        .build()
}

#[utoipa::path(
    post,
    path = "/otp/request",
    tag = "Sign-in",
    operation_id = "requestOtp",
    summary = "Request a sign-in code",
    description = "Sends a one-time code to a registered email or mobile number. Issuing a code expires any earlier code for the same identifier. Limited to one request per `otp.min_interval_secs` and `otp.max_per_hour` per hour; the `Retry-After` header says when to try again.",
    request_body = OtpRequest,
    responses(
        (status = 202, description = "Code issued", body = OtpRequestResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "No applicant with this identifier (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Too many requests (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn request_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_login_purpose(payload.purpose)?;

    let handle = OtpService::new(&state.db, &state.config.otp, state.notifier.as_ref())
        .request(&payload.identifier, payload.purpose)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OtpRequestResponse {
            identifier: handle.identifier,
            purpose: handle.purpose,
            expires_at: handle.expires_at,
            delivered: handle.delivered,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/otp/verify",
    tag = "Sign-in",
    operation_id = "verifyOtp",
    summary = "Exchange a sign-in code for a session",
    description = "Consumes the latest code issued for the identifier. A code verifies once. Each wrong guess counts; after `otp.max_attempts` the code is locked (`ATTEMPTS_EXCEEDED`). On success returns a session token and sets the session cookie.",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Signed in", body = OtpVerifyResponse),
        (status = 400, description = "Wrong or expired code (OTP_MISMATCH, OTP_EXPIRED, VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "No active code (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Code locked (ATTEMPTS_EXCEEDED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<OtpVerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_login_purpose(payload.purpose)?;

    let verified = OtpService::new(&state.db, &state.config.otp, state.notifier.as_ref())
        .verify(&payload.identifier, payload.purpose, &payload.code)
        .await?;

    let applicant = applicant::Entity::find()
        .filter(
            Condition::any()
                .add(applicant::Column::Email.eq(&verified.identifier))
                .add(applicant::Column::Mobile.eq(&verified.identifier)),
        )
        .filter(applicant::Column::Status.ne(ApplicantStatus::Withdrawn))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Applicant not found".into()))?;

    let session = SessionService::new(&state.db, &state.config.session)
        .create(applicant.id)
        .await?;

    info!(applicant_id = %applicant.id, otp_id = verified.otp_id, "Applicant signed in");

    let jar = jar.add(session_cookie(&state, session.token.clone()));
    Ok((
        jar,
        Json(OtpVerifyResponse {
            session_token: session.token,
            expires_at: session.expires_at,
            applicant: ApplicantResponse::from(applicant),
        }),
    ))
}

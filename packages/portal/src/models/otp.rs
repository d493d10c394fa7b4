use chrono::{DateTime, Utc};
use common::OtpPurpose;
use serde::{Deserialize, Serialize};

use super::applicant::ApplicantResponse;

/// Request body for requesting a sign-in code.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct OtpRequest {
    /// Registered email or mobile number.
    #[schema(example = "asha.rao@example.edu")]
    pub identifier: String,
    /// Defaults to `login`, the only purpose this endpoint serves.
    #[serde(default)]
    pub purpose: OtpPurpose,
}

/// A code was issued.
#[derive(Serialize, utoipa::ToSchema)]
pub struct OtpRequestResponse {
    /// Normalized identifier the code is bound to.
    #[schema(example = "asha.rao@example.edu")]
    pub identifier: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    /// False when the notification gateway refused the message; request a new code later.
    pub delivered: bool,
}

/// Request body for exchanging a code for a session.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct OtpVerifyRequest {
    #[schema(example = "asha.rao@example.edu")]
    pub identifier: String,
    #[serde(default)]
    pub purpose: OtpPurpose,
    #[schema(example = "482913")]
    pub code: String,
}

/// Successful sign-in.
#[derive(Serialize, utoipa::ToSchema)]
pub struct OtpVerifyResponse {
    /// Send as `Authorization: Bearer <token>`; also set as a cookie.
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub applicant: ApplicantResponse,
}

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use crate::entity::applicant;
use crate::error::AppError;
use crate::session::SessionService;
use crate::state::AppState;

use super::auth::bearer_token;

/// Signed-in applicant, resolved from a session token.
///
/// The token is read from `Authorization: Bearer <token>` or, failing that,
/// from the session cookie.
pub struct CurrentApplicant {
    pub applicant: applicant::Model,
    /// The raw token, needed to end the session.
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentApplicant {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts)? {
            Some(token) => token.to_owned(),
            None => CookieJar::from_headers(&parts.headers)
                .get(&state.config.session.cookie_name)
                .map(|c| c.value().to_owned())
                .ok_or(AppError::TokenMissing)?,
        };

        let sessions = SessionService::new(&state.db, &state.config.session);
        let applicant = state
            .store_retry
            .run("session.validate", AppError::is_transient, || {
                sessions.validate(&token)
            })
            .await?;

        Ok(CurrentApplicant { applicant, token })
    }
}

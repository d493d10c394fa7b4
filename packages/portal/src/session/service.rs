use chrono::{DateTime, Duration, Utc};
use common::SessionConfig;
use common::secret::{SecretDigest, generate_token};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::{applicant, applicant_session, otp_verification};
use crate::error::AppError;

/// Bearer credential handed to an applicant after sign-in.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Rows removed by one purge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub sessions: u64,
    pub otps: u64,
}

/// OTP rows are kept this long past their expiry before purging.
const OTP_RETENTION_HOURS: i64 = 24;

/// Applicant sessions with fixed expiry.
///
/// Only the SHA-256 of a token is stored. Validation refreshes
/// `last_activity` but never moves `expires_at`.
pub struct SessionService<'a, C: ConnectionTrait> {
    conn: &'a C,
    config: &'a SessionConfig,
}

impl<'a, C: ConnectionTrait> SessionService<'a, C> {
    pub fn new(conn: &'a C, config: &'a SessionConfig) -> Self {
        Self { conn, config }
    }

    pub async fn create(&self, applicant_id: Uuid) -> Result<SessionToken, AppError> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.ttl_hours);

        let session = applicant_session::ActiveModel {
            token_hash: Set(SecretDigest::compute(&token).to_hex()),
            applicant_id: Set(applicant_id),
            expires_at: Set(expires_at),
            last_activity: Set(now),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;

        info!(%applicant_id, session_id = session.id, "Session created");

        Ok(SessionToken { token, expires_at })
    }

    /// Resolve a token to its applicant.
    ///
    /// Expired sessions are deleted on sight. Sessions of withdrawn
    /// applicants are treated as unknown.
    pub async fn validate(&self, token: &str) -> Result<applicant::Model, AppError> {
        if token.is_empty() {
            return Err(AppError::SessionNotFound);
        }

        let session = applicant_session::Entity::find()
            .filter(applicant_session::Column::TokenHash.eq(SecretDigest::compute(token).to_hex()))
            .one(self.conn)
            .await?
            .ok_or(AppError::SessionNotFound)?;

        let now = Utc::now();
        if now > session.expires_at {
            applicant_session::Entity::delete_by_id(session.id)
                .exec(self.conn)
                .await?;
            debug!(session_id = session.id, "Expired session removed");
            return Err(AppError::SessionExpired);
        }

        let applicant = applicant::Entity::find_by_id(session.applicant_id)
            .one(self.conn)
            .await?
            .filter(|a| a.status.is_active())
            .ok_or(AppError::SessionNotFound)?;

        applicant_session::Entity::update_many()
            .col_expr(applicant_session::Column::LastActivity, Expr::value(now))
            .filter(applicant_session::Column::Id.eq(session.id))
            .exec(self.conn)
            .await?;

        Ok(applicant)
    }

    /// Delete the session for `token`. Unknown tokens are ignored.
    pub async fn invalidate(&self, token: &str) -> Result<(), AppError> {
        let result = applicant_session::Entity::delete_many()
            .filter(applicant_session::Column::TokenHash.eq(SecretDigest::compute(token).to_hex()))
            .exec(self.conn)
            .await?;
        if result.rows_affected > 0 {
            info!("Session invalidated");
        }
        Ok(())
    }

    /// Drop every session belonging to an applicant.
    pub async fn invalidate_all(&self, applicant_id: Uuid) -> Result<u64, DbErr> {
        let result = applicant_session::Entity::delete_many()
            .filter(applicant_session::Column::ApplicantId.eq(applicant_id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Remove expired sessions and stale passcodes.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeStats, DbErr> {
        let sessions = applicant_session::Entity::delete_many()
            .filter(applicant_session::Column::ExpiresAt.lt(now))
            .exec(self.conn)
            .await?
            .rows_affected;

        let otps = otp_verification::Entity::delete_many()
            .filter(
                otp_verification::Column::ExpiresAt.lt(now - Duration::hours(OTP_RETENTION_HOURS)),
            )
            .exec(self.conn)
            .await?
            .rows_affected;

        Ok(PurgeStats { sessions, otps })
    }
}

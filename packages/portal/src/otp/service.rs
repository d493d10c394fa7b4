use std::cmp;

use chrono::{DateTime, Duration, Utc};
use common::identity::normalize_identifier;
use common::secret::{SecretDigest, generate_numeric_code};
use common::{ApplicantStatus, OtpConfig, OtpPurpose};
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{admin_user, applicant, otp_verification};
use crate::error::AppError;
use crate::notification::{Dispatcher, Notifier, messages};

/// A freshly issued passcode. The raw code itself only leaves through the notifier.
#[derive(Debug, Clone)]
pub struct OtpHandle {
    pub id: i32,
    pub identifier: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    /// Whether the notifier accepted the message.
    pub delivered: bool,
}

/// Proof that a code was consumed.
#[derive(Debug, Clone)]
pub struct VerifiedOtp {
    pub otp_id: i32,
    pub identifier: String,
    pub purpose: OtpPurpose,
}

/// Issues and verifies one-time passcodes.
///
/// At most one code per (identifier, purpose) is live: issuing a new one
/// expires the previous ones. Rate limits are counted from stored rows, so
/// they hold across processes.
pub struct OtpService<'a, C: ConnectionTrait> {
    conn: &'a C,
    config: &'a OtpConfig,
    notifier: &'a dyn Notifier,
}

impl<'a, C: ConnectionTrait> OtpService<'a, C> {
    pub fn new(conn: &'a C, config: &'a OtpConfig, notifier: &'a dyn Notifier) -> Self {
        Self {
            conn,
            config,
            notifier,
        }
    }

    /// Issue a new code for `identifier` and send it out.
    #[instrument(skip(self, raw_identifier), fields(purpose = %purpose))]
    pub async fn request(
        &self,
        raw_identifier: &str,
        purpose: OtpPurpose,
    ) -> Result<OtpHandle, AppError> {
        let identifier = normalize_identifier(raw_identifier)
            .ok_or_else(|| AppError::field("identifier", "Email or mobile number is required"))?;

        self.ensure_known(&identifier, purpose).await?;
        self.check_rate_limit(&identifier, purpose).await?;

        let now = Utc::now();
        let code = generate_numeric_code(self.config.code_length);

        // Supersede any code that is still live
        otp_verification::Entity::update_many()
            .col_expr(otp_verification::Column::ExpiresAt, Expr::value(now))
            .filter(otp_verification::Column::Identifier.eq(&identifier))
            .filter(otp_verification::Column::Purpose.eq(purpose))
            .filter(otp_verification::Column::Verified.eq(false))
            .filter(otp_verification::Column::ExpiresAt.gt(now))
            .exec(self.conn)
            .await?;

        let row = otp_verification::ActiveModel {
            identifier: Set(identifier.clone()),
            code_hash: Set(SecretDigest::compute(&code).to_hex()),
            purpose: Set(purpose),
            expires_at: Set(now + Duration::seconds(self.config.ttl_secs as i64)),
            verified: Set(false),
            attempts: Set(0),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;

        let message = messages::otp_code(&identifier, &code, purpose, self.config.ttl_secs);
        let delivered = Dispatcher::new(self.conn, self.notifier)
            .dispatch(&message)
            .await;

        info!(otp_id = row.id, delivered, "OTP issued");

        Ok(OtpHandle {
            id: row.id,
            identifier,
            purpose,
            expires_at: row.expires_at,
            delivered,
        })
    }

    /// Consume the latest code for (`identifier`, `purpose`).
    ///
    /// A code verifies at most once. Wrong guesses count against the code
    /// and lock it once `max_attempts` is reached.
    #[instrument(skip(self, raw_identifier, code), fields(purpose = %purpose))]
    pub async fn verify(
        &self,
        raw_identifier: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<VerifiedOtp, AppError> {
        let identifier = normalize_identifier(raw_identifier)
            .ok_or_else(|| AppError::field("identifier", "Email or mobile number is required"))?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::field("code", "Code is required"));
        }

        let latest = self
            .latest(&identifier, purpose)
            .await?
            .filter(|otp| !otp.verified)
            .ok_or_else(|| AppError::NotFound("No active code for this identifier".into()))?;

        let now = Utc::now();
        if now > latest.expires_at {
            return Err(AppError::OtpExpired);
        }
        let max_attempts = self.config.max_attempts;
        if latest.attempts >= max_attempts {
            return Err(AppError::AttemptsExceeded);
        }

        if !SecretDigest::compute(code).matches_hex(&latest.code_hash) {
            let result = otp_verification::Entity::update_many()
                .col_expr(
                    otp_verification::Column::Attempts,
                    Expr::col(otp_verification::Column::Attempts).add(1),
                )
                .filter(otp_verification::Column::Id.eq(latest.id))
                .filter(otp_verification::Column::Verified.eq(false))
                .filter(otp_verification::Column::Attempts.lt(max_attempts))
                .exec(self.conn)
                .await?;

            if result.rows_affected == 0 {
                // Lost a race against other guesses or a successful verify
                return Err(AppError::AttemptsExceeded);
            }
            let attempts_remaining = cmp::max(max_attempts - latest.attempts - 1, 0);
            info!(otp_id = latest.id, attempts_remaining, "OTP mismatch");
            return Err(AppError::OtpMismatch { attempts_remaining });
        }

        let result = otp_verification::Entity::update_many()
            .col_expr(otp_verification::Column::Verified, Expr::value(true))
            .filter(otp_verification::Column::Id.eq(latest.id))
            .filter(otp_verification::Column::Verified.eq(false))
            .filter(otp_verification::Column::Attempts.lt(max_attempts))
            .filter(otp_verification::Column::ExpiresAt.gte(now))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("No active code for this identifier".into()));
        }

        info!(otp_id = latest.id, "OTP verified");

        Ok(VerifiedOtp {
            otp_id: latest.id,
            identifier,
            purpose,
        })
    }

    async fn latest(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
    ) -> Result<Option<otp_verification::Model>, DbErr> {
        otp_verification::Entity::find()
            .filter(otp_verification::Column::Identifier.eq(identifier))
            .filter(otp_verification::Column::Purpose.eq(purpose))
            .order_by_desc(otp_verification::Column::Id)
            .one(self.conn)
            .await
    }

    /// Codes are only issued to identities that exist.
    async fn ensure_known(&self, identifier: &str, purpose: OtpPurpose) -> Result<(), AppError> {
        let known = match purpose {
            OtpPurpose::Login => {
                applicant::Entity::find()
                    .filter(
                        Condition::any()
                            .add(applicant::Column::Email.eq(identifier))
                            .add(applicant::Column::Mobile.eq(identifier)),
                    )
                    .filter(applicant::Column::Status.ne(ApplicantStatus::Withdrawn))
                    .count(self.conn)
                    .await?
                    > 0
            }
            OtpPurpose::PasswordReset => {
                admin_user::Entity::find()
                    .filter(admin_user::Column::Email.eq(identifier))
                    .count(self.conn)
                    .await?
                    > 0
            }
        };

        if known {
            Ok(())
        } else {
            Err(AppError::NotFound("No account for this identifier".into()))
        }
    }

    /// Enforce the minimum interval between codes and the hourly cap.
    ///
    /// Optimistic: two requests racing within the same instant may both pass.
    async fn check_rate_limit(&self, identifier: &str, purpose: OtpPurpose) -> Result<(), AppError> {
        let now = Utc::now();

        if self.config.min_interval_secs > 0
            && let Some(latest) = self.latest(identifier, purpose).await?
        {
            let ready_at =
                latest.created_at + Duration::seconds(self.config.min_interval_secs as i64);
            if ready_at > now {
                return Err(AppError::RateLimited {
                    retry_after: seconds_until(ready_at, now),
                });
            }
        }

        if self.config.max_per_hour == 0 {
            return Ok(()); // Hourly cap disabled
        }

        let window_start = now - Duration::hours(1);
        let recent = otp_verification::Entity::find()
            .filter(otp_verification::Column::Identifier.eq(identifier))
            .filter(otp_verification::Column::Purpose.eq(purpose))
            .filter(otp_verification::Column::CreatedAt.gt(window_start));

        let count = recent.clone().count(self.conn).await?;
        if count >= self.config.max_per_hour {
            let oldest = recent
                .order_by_asc(otp_verification::Column::CreatedAt)
                .one(self.conn)
                .await?;
            let retry_after = oldest
                .map(|o| seconds_until(o.created_at + Duration::hours(1), now))
                .unwrap_or(3600);
            return Err(AppError::RateLimited { retry_after });
        }

        Ok(())
    }
}

/// Whole seconds until `at`, never less than one.
fn seconds_until(at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (at - now).num_milliseconds();
    cmp::max((millis + 999) / 1000, 1) as u64
}

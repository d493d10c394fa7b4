pub mod admin_user;
pub mod applicant;
pub mod applicant_session;
pub mod notification_log;
pub mod otp_verification;
pub mod stage;
pub mod stage_submission;

pub mod applicant_status;
pub mod config;
pub mod identity;
pub mod retry;
pub mod secret;
pub mod stage_status;
pub mod submission_status;

pub use applicant_status::ApplicantStatus;
pub use config::{OtpConfig, RetryConfig, SessionConfig, SweeperConfig};
pub use identity::{NotificationChannel, OtpPurpose};
pub use retry::RetryPolicy;
pub use stage_status::StageStatus;
pub use submission_status::{Decision, SubmissionStatus};

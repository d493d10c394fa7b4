pub mod applicant;
pub mod auth;
pub mod notification;
pub mod otp;
pub mod shared;
pub mod stage;
pub mod submission;

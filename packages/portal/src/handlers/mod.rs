pub mod admin;
pub mod applicant;
pub mod auth;
pub mod notification;
pub mod otp;
pub mod registration;
pub mod review;
pub mod stage;

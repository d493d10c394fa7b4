mod service;

pub use service::{OtpHandle, OtpService, VerifiedOtp};

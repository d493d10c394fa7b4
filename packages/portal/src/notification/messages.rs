//! Message templates.

use common::{NotificationChannel, OtpPurpose, SubmissionStatus};

use super::Notification;
use crate::entity::applicant;

pub fn otp_code(identifier: &str, code: &str, purpose: OtpPurpose, ttl_secs: u64) -> Notification {
    let minutes = ttl_secs.div_ceil(60);
    let (subject, action) = match purpose {
        OtpPurpose::Login => ("Your sign-in code", "sign in"),
        OtpPurpose::PasswordReset => ("Your password reset code", "reset your password"),
    };
    let body = format!(
        "Use {code} to {action}. The code expires in {minutes} minute(s). \
         If you did not ask for it, ignore this message."
    );
    Notification::new(
        NotificationChannel::for_identifier(identifier),
        identifier,
        subject,
        body,
    )
    .with_redacted(code)
}

pub fn registration_received(applicant: &applicant::Model) -> Notification {
    Notification::mail(
        &applicant.email,
        "Registration received",
        format!(
            "Hi {}, your registration is complete. Your registration ID is {}. \
             Sign in with your email or mobile number to follow your application.",
            applicant.name, applicant.registration_id
        ),
    )
}

pub fn selected(applicant: &applicant::Model, confirmation_token: &str) -> Notification {
    Notification::mail(
        &applicant.email,
        "You have been selected",
        format!(
            "Hi {}, you have been selected to participate. Confirm your participation \
             with the code {} or from your dashboard.",
            applicant.name, confirmation_token
        ),
    )
    .with_redacted(confirmation_token)
}

pub fn decision(
    applicant: &applicant::Model,
    stage_name: &str,
    status: SubmissionStatus,
    feedback: Option<&str>,
) -> Notification {
    let outcome = match status {
        SubmissionStatus::Accepted => "has been accepted",
        SubmissionStatus::Rejected => "was not accepted",
        SubmissionStatus::NeedsRevision => "needs revision before it can be accepted",
        _ => "has been updated",
    };
    let mut body = format!(
        "Hi {}, your submission for {} {}.",
        applicant.name, stage_name, outcome
    );
    if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
        body.push_str("\n\nFeedback: ");
        body.push_str(feedback.trim());
    }
    Notification::mail(&applicant.email, format!("Update on your {stage_name} submission"), body)
}

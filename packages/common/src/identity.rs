#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a one-time passcode was issued for.
///
/// Codes are only valid for the purpose they were requested with.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    /// Applicant sign-in.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "login"))]
    Login,
    /// Admin password reset.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "password_reset"))]
    PasswordReset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery channel for outgoing notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "mail"))]
    Mail,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "sms"))]
    Sms,
}

impl NotificationChannel {
    /// Mail for email addresses, SMS for everything else.
    pub fn for_identifier(identifier: &str) -> Self {
        if identifier.contains('@') {
            Self::Mail
        } else {
            Self::Sms
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mail => "mail",
            Self::Sms => "sms",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize an email or mobile identifier into its stored form.
///
/// Emails are trimmed and lower-cased. Mobile numbers lose spaces, dashes and
/// parentheses. Returns `None` when nothing is left.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('@') {
        return Some(trimmed.to_lowercase());
    }
    let mobile: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if mobile.is_empty() { None } else { Some(mobile) }
}

/// Returns true for a plausible mobile number: 10-15 digits with an optional leading `+`.
pub fn is_valid_mobile(mobile: &str) -> bool {
    let digits = mobile.strip_prefix('+').unwrap_or(mobile);
    (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

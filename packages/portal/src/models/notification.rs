use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{ApplicantStatus, NotificationChannel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::notification_log;
use crate::error::AppError;

use super::shared::Pagination;

/// Upper bound on explicitly listed broadcast recipients.
pub const MAX_RECIPIENTS: usize = 1000;

/// Request body for a broadcast. Exactly one of `applicant_ids` and `status` selects recipients.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct BroadcastRequest {
    pub applicant_ids: Option<Vec<Uuid>>,
    /// Every applicant currently in this status.
    pub status: Option<ApplicantStatus>,
    pub channel: NotificationChannel,
    /// 1-200 characters.
    #[schema(example = "Stage 2 opens tomorrow")]
    pub subject: String,
    /// 1-5000 characters.
    pub body: String,
}

pub fn validate_broadcast(payload: &BroadcastRequest) -> Result<(), AppError> {
    match (&payload.applicant_ids, payload.status) {
        (Some(_), Some(_)) | (None, None) => {
            return Err(AppError::validation(
                "Provide exactly one of applicant_ids or status",
            ));
        }
        (Some(ids), None) => {
            if ids.is_empty() || ids.len() > MAX_RECIPIENTS {
                return Err(AppError::field(
                    "applicant_ids",
                    format!("applicant_ids must hold 1-{MAX_RECIPIENTS} entries"),
                ));
            }
            if ids.iter().collect::<BTreeSet<_>>().len() != ids.len() {
                return Err(AppError::field("applicant_ids", "Duplicate applicant ID"));
            }
        }
        (None, Some(_)) => {}
    }
    let subject = payload.subject.trim();
    if subject.is_empty() || subject.chars().count() > 200 {
        return Err(AppError::field("subject", "subject must be 1-200 characters"));
    }
    let body = payload.body.trim();
    if body.is_empty() || body.chars().count() > 5000 {
        return Err(AppError::field("body", "body must be 1-5000 characters"));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BroadcastRecipient {
    pub applicant_id: Uuid,
    /// Email or mobile the message went to.
    pub recipient: String,
    pub delivered: bool,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct BroadcastResponse {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    pub results: Vec<BroadcastRecipient>,
}

/// Query parameters for the notification log.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct NotificationLogQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    pub channel: Option<NotificationChannel>,
    pub delivered: Option<bool>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct NotificationLogItem {
    pub id: i32,
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
    /// Codes appear as `******`.
    pub body: String,
    pub delivered: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<notification_log::Model> for NotificationLogItem {
    fn from(m: notification_log::Model) -> Self {
        Self {
            id: m.id,
            channel: m.channel,
            recipient: m.recipient,
            subject: m.subject,
            body: m.body,
            delivered: m.delivered,
            error: m.error,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct NotificationLogResponse {
    pub data: Vec<NotificationLogItem>,
    pub pagination: Pagination,
}

use axum::{
    Json,
    extract::{Query, State},
};
use common::NotificationChannel;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{applicant, notification_log};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::notification::{
    BroadcastRecipient, BroadcastRequest, BroadcastResponse, NotificationLogItem,
    NotificationLogQuery, NotificationLogResponse, validate_broadcast,
};
use crate::models::shared::Pagination;
use crate::notification::{Dispatcher, Notification};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/admin/notifications",
    tag = "Notifications",
    operation_id = "broadcast",
    summary = "Message a group of applicants",
    description = "Recipients are either explicit applicant IDs or every applicant in a status. Withdrawn applicants are skipped. Delivery is best-effort and reported per recipient. Sends run concurrently and the whole broadcast is capped at `notification.broadcast_budget_ms`; recipients not reached in time are reported as not delivered. Requires `notification:send` permission.",
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Per-recipient outcome", body = BroadcastResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(channel = %payload.channel))]
pub async fn broadcast(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, AppError> {
    auth_user.require_permission("notification:send")?;
    validate_broadcast(&payload)?;

    let mut select = applicant::Entity::find()
        .filter(applicant::Column::Status.ne(common::ApplicantStatus::Withdrawn));
    select = match (&payload.applicant_ids, payload.status) {
        (Some(ids), _) => select.filter(applicant::Column::Id.is_in(ids.iter().copied())),
        (None, Some(status)) => select.filter(applicant::Column::Status.eq(status)),
        (None, None) => select,
    };
    let recipients = select
        .order_by_asc(applicant::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let subject = payload.subject.trim();
    let body = payload.body.trim();
    let messages: Vec<Notification> = recipients
        .iter()
        .map(|a| {
            let to = match payload.channel {
                NotificationChannel::Mail => &a.email,
                NotificationChannel::Sms => &a.mobile,
            };
            Notification::new(payload.channel, to.clone(), subject, body)
        })
        .collect();

    let settings = &state.config.notification;
    let outcomes = Dispatcher::new(&state.db, state.notifier.as_ref())
        .dispatch_all(
            &messages,
            settings.broadcast_concurrency,
            settings.broadcast_budget(),
        )
        .await;

    let results: Vec<BroadcastRecipient> = recipients
        .iter()
        .zip(messages)
        .zip(outcomes)
        .map(|((a, message), delivered)| BroadcastRecipient {
            applicant_id: a.id,
            recipient: message.to,
            delivered,
        })
        .collect();

    let total = results.len();
    let delivered = results.iter().filter(|r| r.delivered).count();
    info!(
        total,
        delivered,
        sent_by = auth_user.user_id,
        "Broadcast finished"
    );

    Ok(Json(BroadcastResponse {
        total,
        delivered,
        failed: total - delivered,
        results,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/notifications",
    tag = "Notifications",
    operation_id = "listNotifications",
    summary = "Browse the notification log",
    description = "Newest first. One-time codes are stored redacted. Requires `notification:send` permission.",
    params(NotificationLogQuery),
    responses(
        (status = 200, description = "Log entries", body = NotificationLogResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_notifications(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<NotificationLogQuery>,
) -> Result<Json<NotificationLogResponse>, AppError> {
    auth_user.require_permission("notification:send")?;

    let (page, per_page) = Pagination::clamp(query.page, query.per_page);

    let mut select = notification_log::Entity::find();
    if let Some(channel) = query.channel {
        select = select.filter(notification_log::Column::Channel.eq(channel));
    }
    if let Some(delivered) = query.delivered {
        select = select.filter(notification_log::Column::Delivered.eq(delivered));
    }

    let total = select.clone().count(&state.db).await?;
    let data = select
        .order_by_desc(notification_log::Column::CreatedAt)
        .order_by_desc(notification_log::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(NotificationLogItem::from)
        .collect();

    Ok(Json(NotificationLogResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

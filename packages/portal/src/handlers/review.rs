use axum::{
    Json,
    extract::{Path, State},
};
use sea_orm::EntityTrait;
use tracing::{instrument, warn};

use crate::entity::{applicant, stage};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::submission::{
    BulkDecisionReport, BulkDecisionRequest, DecisionRequest, ReviewSubmissionResponse,
};
use crate::notification::{Dispatcher, messages};
use crate::state::AppState;
use crate::workflow::SubmissionWorkflow;

#[utoipa::path(
    post,
    path = "/admin/submissions/{id}/review",
    tag = "Review",
    operation_id = "startReview",
    summary = "Pick up a submission for review",
    description = "`submitted -> under_review`. Requires `submission:review` permission.",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Review started", body = ReviewSubmissionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Not submitted (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(submission_id = id, reviewer_id = auth_user.user_id))]
pub async fn start_review(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ReviewSubmissionResponse>, AppError> {
    auth_user.require_permission("submission:review")?;

    let submission = SubmissionWorkflow::new(&state.db)
        .start_review(id, auth_user.user_id)
        .await?;
    let owner = applicant::Entity::find_by_id(submission.applicant_id)
        .one(&state.db)
        .await?;
    let (registration_id, name) = owner
        .map(|a| (a.registration_id, a.name))
        .unwrap_or_default();

    Ok(Json(ReviewSubmissionResponse::new(submission, registration_id, name)))
}

#[utoipa::path(
    post,
    path = "/admin/submissions/{id}/decision",
    tag = "Review",
    operation_id = "decideSubmission",
    summary = "Record a review decision",
    description = "`under_review -> accepted | rejected | needs_revision`. The applicant is notified. Requires `submission:review` permission.",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision recorded", body = ReviewSubmissionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Not under review (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(submission_id = id, reviewer_id = auth_user.user_id))]
pub async fn decide(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<DecisionRequest>,
) -> Result<Json<ReviewSubmissionResponse>, AppError> {
    auth_user.require_permission("submission:review")?;

    let decided = SubmissionWorkflow::new(&state.db)
        .decide(id, auth_user.user_id, payload)
        .await?;

    let owner = applicant::Entity::find_by_id(decided.applicant_id)
        .one(&state.db)
        .await?;
    let stage_name = stage::Entity::find_by_id(decided.stage_id)
        .one(&state.db)
        .await?
        .map(|s| s.name)
        .unwrap_or_default();

    let Some(owner) = owner else {
        warn!(applicant_id = %decided.applicant_id, "Decided submission has no applicant");
        return Ok(Json(ReviewSubmissionResponse::new(
            decided,
            String::new(),
            String::new(),
        )));
    };

    Dispatcher::new(&state.db, state.notifier.as_ref())
        .dispatch(&messages::decision(
            &owner,
            &stage_name,
            decided.status,
            decided.feedback.as_deref(),
        ))
        .await;

    Ok(Json(ReviewSubmissionResponse::new(
        decided,
        owner.registration_id,
        owner.name,
    )))
}

#[utoipa::path(
    post,
    path = "/admin/submissions/bulk-decisions",
    tag = "Review",
    operation_id = "bulkDecisions",
    summary = "Import decisions in bulk",
    description = "Applies `accepted` or `rejected` to each row's submission (from `submitted` or `under_review`). Rows identify the applicant by registration ID, email or mobile. Failing rows are reported and skipped; the rest still apply. No notifications are sent. Requires `submission:review` permission.",
    request_body = BulkDecisionRequest,
    responses(
        (status = 200, description = "Per-row report", body = BulkDecisionReport),
        (status = 400, description = "Empty or oversized import (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(rows = payload.rows.len(), reviewer_id = auth_user.user_id))]
pub async fn bulk_decisions(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<BulkDecisionRequest>,
) -> Result<Json<BulkDecisionReport>, AppError> {
    auth_user.require_permission("submission:review")?;

    let report = SubmissionWorkflow::new(&state.db)
        .bulk_decide(auth_user.user_id, payload.rows)
        .await?;
    Ok(Json(report))
}

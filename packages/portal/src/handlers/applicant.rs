use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use chrono::Utc;
use common::ApplicantStatus;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{applicant, stage, stage_submission};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::extractors::session::CurrentApplicant;
use crate::models::applicant::{ApplicantDashboard, ApplicantResponse, ConfirmParticipationRequest};
use crate::models::stage::StageResponse;
use crate::models::submission::{SubmissionEditRequest, SubmissionResponse};
use crate::session::SessionService;
use crate::state::AppState;
use crate::workflow::SubmissionWorkflow;

/// Move a selected applicant to `confirmed`, consuming the confirmation token.
async fn confirm_applicant<C: ConnectionTrait>(
    db: &C,
    applicant: &applicant::Model,
) -> Result<applicant::Model, AppError> {
    if !applicant.status.can_transition_to(ApplicantStatus::Confirmed) {
        return Err(AppError::InvalidTransition {
            from: applicant.status.as_str(),
            to: ApplicantStatus::Confirmed.as_str(),
        });
    }

    let now = Utc::now();
    let result = applicant::Entity::update_many()
        .col_expr(
            applicant::Column::Status,
            Expr::value(ApplicantStatus::Confirmed),
        )
        .col_expr(applicant::Column::ConfirmedAt, Expr::value(now))
        .col_expr(
            applicant::Column::ConfirmationToken,
            Expr::value(Option::<String>::None),
        )
        .col_expr(applicant::Column::UpdatedAt, Expr::value(now))
        .filter(applicant::Column::Id.eq(applicant.id))
        .filter(applicant::Column::Status.eq(ApplicantStatus::Selected))
        .exec(db)
        .await?;

    let current = applicant::Entity::find_by_id(applicant.id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Applicant not found".into()))?;

    if result.rows_affected == 0 {
        return Err(AppError::InvalidTransition {
            from: current.status.as_str(),
            to: ApplicantStatus::Confirmed.as_str(),
        });
    }

    info!(applicant_id = %current.id, "Participation confirmed");
    Ok(current)
}

#[utoipa::path(
    post,
    path = "/confirm-participation",
    tag = "Registration",
    operation_id = "confirmParticipationByCode",
    summary = "Confirm participation with the mailed code",
    request_body = ConfirmParticipationRequest,
    responses(
        (status = 200, description = "Participation confirmed", body = ApplicantResponse),
        (status = 404, description = "Unknown code (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Applicant is not selected (INVALID_TRANSITION)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn confirm_by_code(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ConfirmParticipationRequest>,
) -> Result<Json<ApplicantResponse>, AppError> {
    let code = payload.code.trim();
    if code.is_empty() {
        return Err(AppError::field("code", "Confirmation code is required"));
    }

    let applicant = applicant::Entity::find()
        .filter(applicant::Column::ConfirmationToken.eq(code))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid confirmation code".into()))?;

    let confirmed = confirm_applicant(&state.db, &applicant).await?;
    Ok(Json(ApplicantResponse::from(confirmed)))
}

#[utoipa::path(
    post,
    path = "/applicant/confirm-participation",
    tag = "Applicant",
    operation_id = "confirmParticipation",
    summary = "Confirm participation from a signed-in session",
    responses(
        (status = 200, description = "Participation confirmed", body = ApplicantResponse),
        (status = 401, description = "Not signed in (TOKEN_MISSING, SESSION_NOT_FOUND, SESSION_EXPIRED)", body = ErrorBody),
        (status = 409, description = "Applicant is not selected (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, current), fields(applicant_id = %current.applicant.id))]
pub async fn confirm_participation(
    current: CurrentApplicant,
    State(state): State<AppState>,
) -> Result<Json<ApplicantResponse>, AppError> {
    let confirmed = confirm_applicant(&state.db, &current.applicant).await?;
    Ok(Json(ApplicantResponse::from(confirmed)))
}

#[utoipa::path(
    get,
    path = "/applicant/me",
    tag = "Applicant",
    operation_id = "applicantDashboard",
    summary = "Signed-in applicant's dashboard",
    description = "Profile, own submissions and the stage list.",
    responses(
        (status = 200, description = "Dashboard", body = ApplicantDashboard),
        (status = 401, description = "Not signed in (TOKEN_MISSING, SESSION_NOT_FOUND, SESSION_EXPIRED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, current), fields(applicant_id = %current.applicant.id))]
pub async fn me(
    current: CurrentApplicant,
    State(state): State<AppState>,
) -> Result<Json<ApplicantDashboard>, AppError> {
    let submissions = own_submissions(&state.db, &current.applicant).await?;
    let stages = stage::Entity::find()
        .order_by_asc(stage::Column::Position)
        .order_by_asc(stage::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(StageResponse::from)
        .collect();

    Ok(Json(ApplicantDashboard {
        applicant: ApplicantResponse::from(current.applicant),
        submissions,
        stages,
    }))
}

async fn own_submissions<C: ConnectionTrait>(
    db: &C,
    applicant: &applicant::Model,
) -> Result<Vec<SubmissionResponse>, AppError> {
    Ok(stage_submission::Entity::find()
        .filter(stage_submission::Column::ApplicantId.eq(applicant.id))
        .order_by_asc(stage_submission::Column::StageId)
        .all(db)
        .await?
        .into_iter()
        .map(SubmissionResponse::from)
        .collect())
}

#[utoipa::path(
    post,
    path = "/applicant/logout",
    tag = "Applicant",
    operation_id = "applicantLogout",
    summary = "End the current session",
    responses(
        (status = 204, description = "Session ended"),
        (status = 401, description = "Not signed in (TOKEN_MISSING, SESSION_NOT_FOUND, SESSION_EXPIRED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, current, jar), fields(applicant_id = %current.applicant.id))]
pub async fn logout(
    current: CurrentApplicant,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    SessionService::new(&state.db, &state.config.session)
        .invalidate(&current.token)
        .await?;

    let cookie = Cookie::build(state.config.session.cookie_name.clone()).path("/");
    Ok((jar.remove(cookie), StatusCode::NO_CONTENT))
}

#[utoipa::path(
    get,
    path = "/applicant/submissions",
    tag = "Applicant",
    operation_id = "listOwnSubmissions",
    summary = "List own submissions",
    responses(
        (status = 200, description = "Submissions, one per stage at most", body = Vec<SubmissionResponse>),
        (status = 401, description = "Not signed in (TOKEN_MISSING, SESSION_NOT_FOUND, SESSION_EXPIRED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, current), fields(applicant_id = %current.applicant.id))]
pub async fn list_submissions(
    current: CurrentApplicant,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubmissionResponse>>, AppError> {
    Ok(Json(own_submissions(&state.db, &current.applicant).await?))
}

#[utoipa::path(
    put,
    path = "/applicant/submissions/{stage_id}",
    tag = "Applicant",
    operation_id = "saveDraft",
    summary = "Save a draft submission",
    description = "Creates the submission on first use. Only drafts can be edited, and only while the stage is active.",
    params(("stage_id" = i32, Path, description = "Stage ID")),
    request_body = SubmissionEditRequest,
    responses(
        (status = 200, description = "Draft saved", body = SubmissionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Not signed in (TOKEN_MISSING, SESSION_NOT_FOUND, SESSION_EXPIRED)", body = ErrorBody),
        (status = 404, description = "Stage not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Stage closed or not a draft (STAGE_CLOSED, INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, current, payload), fields(applicant_id = %current.applicant.id))]
pub async fn save_draft(
    current: CurrentApplicant,
    State(state): State<AppState>,
    Path(stage_id): Path<i32>,
    AppJson(payload): AppJson<SubmissionEditRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let saved = SubmissionWorkflow::new(&state.db)
        .save_draft(&current.applicant, stage_id, payload)
        .await?;
    Ok(Json(SubmissionResponse::from(saved)))
}

#[utoipa::path(
    post,
    path = "/applicant/submissions/{stage_id}",
    tag = "Applicant",
    operation_id = "submit",
    summary = "Submit for a stage",
    description = "Applies any edits in the body and moves the submission from `draft` to `submitted`. The stage must be active, the deadline (applicant override, else stage end) not passed, and submissions enabled for the applicant. A GitHub repository is required.",
    params(("stage_id" = i32, Path, description = "Stage ID")),
    request_body = SubmissionEditRequest,
    responses(
        (status = 200, description = "Submitted", body = SubmissionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Not signed in (TOKEN_MISSING, SESSION_NOT_FOUND, SESSION_EXPIRED)", body = ErrorBody),
        (status = 403, description = "Submissions not enabled (SUBMISSIONS_DISABLED)", body = ErrorBody),
        (status = 404, description = "Stage not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "STAGE_CLOSED, DEADLINE_PASSED or INVALID_TRANSITION", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, current, payload), fields(applicant_id = %current.applicant.id))]
pub async fn submit(
    current: CurrentApplicant,
    State(state): State<AppState>,
    Path(stage_id): Path<i32>,
    AppJson(payload): AppJson<SubmissionEditRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let submitted = SubmissionWorkflow::new(&state.db)
        .submit(&current.applicant, stage_id, payload)
        .await?;
    Ok(Json(SubmissionResponse::from(submitted)))
}

#[utoipa::path(
    post,
    path = "/applicant/submissions/{stage_id}/reopen",
    tag = "Applicant",
    operation_id = "reopenSubmission",
    summary = "Reopen a submission that needs revision",
    params(("stage_id" = i32, Path, description = "Stage ID")),
    responses(
        (status = 200, description = "Back to draft", body = SubmissionResponse),
        (status = 401, description = "Not signed in (TOKEN_MISSING, SESSION_NOT_FOUND, SESSION_EXPIRED)", body = ErrorBody),
        (status = 404, description = "Stage or submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "STAGE_CLOSED, DEADLINE_PASSED or INVALID_TRANSITION", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, current), fields(applicant_id = %current.applicant.id))]
pub async fn reopen(
    current: CurrentApplicant,
    State(state): State<AppState>,
    Path(stage_id): Path<i32>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let reopened = SubmissionWorkflow::new(&state.db)
        .reopen(&current.applicant, stage_id)
        .await?;
    Ok(Json(SubmissionResponse::from(reopened)))
}

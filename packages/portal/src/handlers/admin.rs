use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use common::secret::generate_readable_id;
use common::{ApplicantStatus, SubmissionStatus};
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::*;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entity::{applicant, stage, stage_submission};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::applicant::{
    ApplicantListQuery, ApplicantListResponse, ApplicantResponse, DashboardStats, StageStats,
    UpdateApplicantRequest,
};
use crate::models::shared::{Pagination, escape_like, validate_name};
use crate::notification::{Dispatcher, messages};
use crate::session::SessionService;
use crate::state::AppState;

async fn find_applicant<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<applicant::Model, AppError> {
    applicant::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Applicant not found".into()))
}

/// Conditionally move an applicant from its current status to `to`.
///
/// The update only lands if nobody changed the status in between.
async fn move_applicant<C: ConnectionTrait>(
    db: &C,
    current: &applicant::Model,
    to: ApplicantStatus,
    changes: Vec<(applicant::Column, SimpleExpr)>,
) -> Result<applicant::Model, AppError> {
    if !current.status.can_transition_to(to) {
        return Err(AppError::InvalidTransition {
            from: current.status.as_str(),
            to: to.as_str(),
        });
    }

    let mut update = applicant::Entity::update_many()
        .col_expr(applicant::Column::Status, Expr::value(to))
        .col_expr(applicant::Column::UpdatedAt, Expr::value(Utc::now()));
    for (col, value) in changes {
        update = update.col_expr(col, value);
    }
    let result = update
        .filter(applicant::Column::Id.eq(current.id))
        .filter(applicant::Column::Status.eq(current.status))
        .exec(db)
        .await?;

    let updated = find_applicant(db, current.id).await?;
    if result.rows_affected == 0 {
        return Err(AppError::InvalidTransition {
            from: updated.status.as_str(),
            to: to.as_str(),
        });
    }
    Ok(updated)
}

fn filtered(query: &ApplicantListQuery) -> Select<applicant::Entity> {
    let mut select = applicant::Entity::find();

    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            let pattern = format!("%{}%", term.to_lowercase());
            let like = |col: applicant::Column| {
                Expr::expr(Func::lower(Expr::col(col)))
                    .like(LikeExpr::new(pattern.clone()).escape('\\'))
            };
            select = select.filter(
                Condition::any()
                    .add(like(applicant::Column::Name))
                    .add(like(applicant::Column::Email))
                    .add(like(applicant::Column::Mobile))
                    .add(like(applicant::Column::RegistrationId)),
            );
        }
    }
    if let Some(status) = query.status {
        select = select.filter(applicant::Column::Status.eq(status));
    }
    select
}

#[utoipa::path(
    get,
    path = "/admin/applicants",
    tag = "Applicants",
    operation_id = "listApplicants",
    summary = "List applicants",
    description = "Paginated, newest first. `search` matches name, email, mobile and registration ID. Requires `applicant:manage` permission.",
    params(ApplicantListQuery),
    responses(
        (status = 200, description = "Applicants", body = ApplicantListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_applicants(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ApplicantListQuery>,
) -> Result<Json<ApplicantListResponse>, AppError> {
    auth_user.require_permission("applicant:manage")?;

    let (page, per_page) = Pagination::clamp(query.page, query.per_page);
    let select = filtered(&query);
    let total = select.clone().count(&state.db).await?;

    let data = select
        .order_by_desc(applicant::Column::CreatedAt)
        .order_by_asc(applicant::Column::RegistrationId)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(ApplicantResponse::from)
        .collect();

    Ok(Json(ApplicantListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/admin/applicants/{id}",
    tag = "Applicants",
    operation_id = "getApplicant",
    summary = "Get an applicant",
    description = "Requires `applicant:manage` permission.",
    params(("id" = Uuid, Path, description = "Applicant ID")),
    responses(
        (status = 200, description = "Applicant", body = ApplicantResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Applicant not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(applicant_id = %id))]
pub async fn get_applicant(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicantResponse>, AppError> {
    auth_user.require_permission("applicant:manage")?;
    Ok(Json(ApplicantResponse::from(find_applicant(&state.db, id).await?)))
}

#[utoipa::path(
    patch,
    path = "/admin/applicants/{id}",
    tag = "Applicants",
    operation_id = "updateApplicant",
    summary = "Edit an applicant",
    description = "Partial update. Send `submission_deadline: null` to fall back to the stage end time. Requires `applicant:manage` permission.",
    params(("id" = Uuid, Path, description = "Applicant ID")),
    request_body = UpdateApplicantRequest,
    responses(
        (status = 200, description = "Applicant updated", body = ApplicantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Applicant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Applicant withdrawn (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(applicant_id = %id))]
pub async fn update_applicant(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateApplicantRequest>,
) -> Result<Json<ApplicantResponse>, AppError> {
    auth_user.require_permission("applicant:manage")?;
    if let Some(name) = &payload.name {
        validate_name("name", name, 100)?;
    }

    let existing = find_applicant(&state.db, id).await?;
    if !existing.status.is_active() {
        return Err(AppError::InvalidTransition {
            from: existing.status.as_str(),
            to: existing.status.as_str(),
        });
    }

    let mut model: applicant::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        model.name = Set(name.trim().to_string());
    }
    if let Some(enabled) = payload.submission_enabled {
        model.submission_enabled = Set(enabled);
    }
    if let Some(deadline) = payload.submission_deadline {
        model.submission_deadline = Set(deadline);
    }
    model.updated_at = Set(Utc::now());

    let updated = model.update(&state.db).await?;
    info!(applicant_id = %id, "Applicant updated");
    Ok(Json(ApplicantResponse::from(updated)))
}

#[utoipa::path(
    delete,
    path = "/admin/applicants/{id}",
    tag = "Applicants",
    operation_id = "withdrawApplicant",
    summary = "Withdraw an applicant",
    description = "Soft delete: the record and its submissions stay, every session is ended and sign-in is refused from then on. Requires `applicant:manage` permission.",
    params(("id" = Uuid, Path, description = "Applicant ID")),
    responses(
        (status = 204, description = "Applicant withdrawn"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Applicant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already withdrawn (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(applicant_id = %id))]
pub async fn withdraw_applicant(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("applicant:manage")?;

    let existing = find_applicant(&state.db, id).await?;
    move_applicant(
        &state.db,
        &existing,
        ApplicantStatus::Withdrawn,
        vec![
            (applicant::Column::SubmissionEnabled, Expr::value(false)),
            (
                applicant::Column::ConfirmationToken,
                Expr::value(Option::<String>::None),
            ),
        ],
    )
    .await?;

    let ended = SessionService::new(&state.db, &state.config.session)
        .invalidate_all(id)
        .await?;

    info!(applicant_id = %id, sessions_ended = ended, "Applicant withdrawn");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/admin/applicants/{id}/select",
    tag = "Applicants",
    operation_id = "selectApplicant",
    summary = "Select an applicant",
    description = "Moves the applicant to `selected`, enables submissions and mails a confirmation code. Requires `applicant:manage` permission.",
    params(("id" = Uuid, Path, description = "Applicant ID")),
    responses(
        (status = 200, description = "Applicant selected", body = ApplicantResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Applicant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Transition not allowed (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(applicant_id = %id))]
pub async fn select_applicant(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicantResponse>, AppError> {
    auth_user.require_permission("applicant:manage")?;

    let existing = find_applicant(&state.db, id).await?;
    let token = generate_readable_id("CF", 10);
    let selected = move_applicant(
        &state.db,
        &existing,
        ApplicantStatus::Selected,
        vec![
            (applicant::Column::SelectedBy, Expr::value(Some(auth_user.user_id))),
            (applicant::Column::SelectedAt, Expr::value(Some(Utc::now()))),
            (
                applicant::Column::ConfirmationToken,
                Expr::value(Some(token.clone())),
            ),
            (applicant::Column::SubmissionEnabled, Expr::value(true)),
        ],
    )
    .await?;

    info!(applicant_id = %id, selected_by = auth_user.user_id, "Applicant selected");

    Dispatcher::new(&state.db, state.notifier.as_ref())
        .dispatch(&messages::selected(&selected, &token))
        .await;

    Ok(Json(ApplicantResponse::from(selected)))
}

#[utoipa::path(
    post,
    path = "/admin/applicants/{id}/reject",
    tag = "Applicants",
    operation_id = "rejectApplicant",
    summary = "Mark an applicant as not selected",
    description = "Disables submissions and voids any outstanding confirmation code. Requires `applicant:manage` permission.",
    params(("id" = Uuid, Path, description = "Applicant ID")),
    responses(
        (status = 200, description = "Applicant not selected", body = ApplicantResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Applicant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Transition not allowed (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(applicant_id = %id))]
pub async fn reject_applicant(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicantResponse>, AppError> {
    auth_user.require_permission("applicant:manage")?;

    let existing = find_applicant(&state.db, id).await?;
    let rejected = move_applicant(
        &state.db,
        &existing,
        ApplicantStatus::NotSelected,
        vec![
            (applicant::Column::SubmissionEnabled, Expr::value(false)),
            (
                applicant::Column::ConfirmationToken,
                Expr::value(Option::<String>::None),
            ),
        ],
    )
    .await?;

    info!(applicant_id = %id, "Applicant not selected");
    Ok(Json(ApplicantResponse::from(rejected)))
}

const CSV_HEADER: &str = "registration_id,name,email,mobile,student_id,course,year_of_graduation,college_name,linkedin_profile,status,submission_enabled,created_at";

/// Quote a CSV field when it contains a delimiter, quote or line break.
///
/// Leading `=`, `+`, `-` and `@` are prefixed with `'` so spreadsheets do not
/// evaluate the cell as a formula.
fn csv_field(value: &str) -> String {
    let value = if value.starts_with(['=', '+', '-', '@']) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

fn csv_row(a: &applicant::Model) -> String {
    [
        csv_field(&a.registration_id),
        csv_field(&a.name),
        csv_field(&a.email),
        csv_field(&a.mobile),
        csv_field(&a.student_id),
        csv_field(&a.course),
        a.year_of_graduation.to_string(),
        csv_field(&a.college_name),
        csv_field(a.linkedin_profile.as_deref().unwrap_or_default()),
        a.status.as_str().to_string(),
        a.submission_enabled.to_string(),
        a.created_at.to_rfc3339(),
    ]
    .join(",")
}

#[utoipa::path(
    get,
    path = "/admin/applicants/export",
    tag = "Applicants",
    operation_id = "exportApplicants",
    summary = "Export applicants as CSV",
    description = "Accepts the same `search` and `status` filters as the list endpoint; pagination is ignored. Requires `applicant:manage` permission.",
    params(ApplicantListQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv", body = String),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn export_applicants(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ApplicantListQuery>,
) -> Result<Response, AppError> {
    auth_user.require_permission("applicant:manage")?;

    let applicants = filtered(&query)
        .order_by_asc(applicant::Column::CreatedAt)
        .order_by_asc(applicant::Column::RegistrationId)
        .all(&state.db)
        .await?;

    let mut csv = String::from(CSV_HEADER);
    csv.push_str("\r\n");
    for a in &applicants {
        csv.push_str(&csv_row(a));
        csv.push_str("\r\n");
    }

    info!(rows = applicants.len(), "Applicants exported");

    let filename = format!("applicants-{}.csv", Utc::now().format("%Y%m%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/admin/dashboard/stats",
    tag = "Applicants",
    operation_id = "dashboardStats",
    summary = "Admin dashboard counts",
    description = "Applicants per status and, for every stage, participants and submissions per status. Requires `applicant:manage` permission.",
    responses(
        (status = 200, description = "Counts", body = DashboardStats),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn dashboard_stats(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    auth_user.require_permission("applicant:manage")?;

    let by_status: Vec<(ApplicantStatus, i64)> = applicant::Entity::find()
        .select_only()
        .column(applicant::Column::Status)
        .column_as(applicant::Column::Id.count(), "count")
        .group_by(applicant::Column::Status)
        .into_tuple()
        .all(&state.db)
        .await?;

    let mut applicants_by_status: BTreeMap<String, u64> = ApplicantStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for (status, count) in &by_status {
        applicants_by_status.insert(status.as_str().to_string(), *count as u64);
    }
    let total_applicants = by_status.iter().map(|(_, c)| *c as u64).sum();

    let submission_counts: Vec<(i32, SubmissionStatus, i64)> = stage_submission::Entity::find()
        .select_only()
        .column(stage_submission::Column::StageId)
        .column(stage_submission::Column::Status)
        .column_as(stage_submission::Column::Id.count(), "count")
        .group_by(stage_submission::Column::StageId)
        .group_by(stage_submission::Column::Status)
        .into_tuple()
        .all(&state.db)
        .await?;

    let stages = stage::Entity::find()
        .order_by_asc(stage::Column::Position)
        .order_by_asc(stage::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|s| {
            let mut submissions_by_status: BTreeMap<String, u64> = SubmissionStatus::ALL
                .iter()
                .map(|st| (st.as_str().to_string(), 0))
                .collect();
            let mut participants = 0;
            for (stage_id, status, count) in &submission_counts {
                if *stage_id == s.id {
                    submissions_by_status.insert(status.as_str().to_string(), *count as u64);
                    participants += *count as u64;
                }
            }
            StageStats {
                id: s.id,
                name: s.name,
                status: s.status,
                participants,
                submissions_by_status,
            }
        })
        .collect();

    Ok(Json(DashboardStats {
        total_applicants,
        applicants_by_status,
        stages,
    }))
}

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use common::StageStatus;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{applicant, stage, stage_submission};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::shared::Pagination;
use crate::models::stage::{
    CreateStageRequest, StageResponse, StageStatusRequest, UpdateStageRequest,
    validate_create_stage, validate_update_stage, validate_window,
};
use crate::models::submission::{
    ReviewSubmissionResponse, StageSubmissionListQuery, StageSubmissionListResponse,
};
use crate::state::AppState;

/// Find a stage by ID or return 404.
async fn find_stage<C: ConnectionTrait>(db: &C, id: i32) -> Result<stage::Model, AppError> {
    stage::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stage not found".into()))
}

async fn all_stages<C: ConnectionTrait>(db: &C) -> Result<Vec<StageResponse>, AppError> {
    Ok(stage::Entity::find()
        .order_by_asc(stage::Column::Position)
        .order_by_asc(stage::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(StageResponse::from)
        .collect())
}

#[utoipa::path(
    get,
    path = "/stages",
    tag = "Stages",
    operation_id = "listStages",
    summary = "List competition stages",
    responses(
        (status = 200, description = "Stages in display order", body = Vec<StageResponse>),
    ),
)]
#[instrument(skip(state))]
pub async fn list_stages(
    State(state): State<AppState>,
) -> Result<Json<Vec<StageResponse>>, AppError> {
    Ok(Json(all_stages(&state.db).await?))
}

#[utoipa::path(
    get,
    path = "/admin/stages",
    tag = "Stages",
    operation_id = "adminListStages",
    summary = "List stages (admin)",
    responses(
        (status = 200, description = "Stages in display order", body = Vec<StageResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn admin_list_stages(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StageResponse>>, AppError> {
    auth_user.require_permission("submission:review")?;
    Ok(Json(all_stages(&state.db).await?))
}

#[utoipa::path(
    post,
    path = "/admin/stages",
    tag = "Stages",
    operation_id = "createStage",
    summary = "Create a stage",
    description = "New stages start as `upcoming`. Requires `stage:manage` permission.",
    request_body = CreateStageRequest,
    responses(
        (status = 201, description = "Stage created", body = StageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_stage(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateStageRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("stage:manage")?;
    validate_create_stage(&payload)?;

    let now = Utc::now();
    let created = stage::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        position: Set(payload.position.unwrap_or(0)),
        start_time: Set(payload.start_time),
        end_time: Set(payload.end_time),
        status: Set(StageStatus::Upcoming),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!(stage_id = created.id, "Stage created");
    Ok((StatusCode::CREATED, Json(StageResponse::from(created))))
}

#[utoipa::path(
    patch,
    path = "/admin/stages/{id}",
    tag = "Stages",
    operation_id = "updateStage",
    summary = "Edit a stage",
    description = "Partial update. The resulting window must still end after it starts. Requires `stage:manage` permission.",
    params(("id" = i32, Path, description = "Stage ID")),
    request_body = UpdateStageRequest,
    responses(
        (status = 200, description = "Stage updated", body = StageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Stage not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(stage_id = id))]
pub async fn update_stage(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateStageRequest>,
) -> Result<Json<StageResponse>, AppError> {
    auth_user.require_permission("stage:manage")?;
    validate_update_stage(&payload)?;

    let existing = find_stage(&state.db, id).await?;
    validate_window(
        payload.start_time.unwrap_or(existing.start_time),
        payload.end_time.unwrap_or(existing.end_time),
    )?;

    let mut model: stage::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        model.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        model.description = Set(description);
    }
    if let Some(position) = payload.position {
        model.position = Set(position);
    }
    if let Some(start_time) = payload.start_time {
        model.start_time = Set(start_time);
    }
    if let Some(end_time) = payload.end_time {
        model.end_time = Set(end_time);
    }
    model.updated_at = Set(Utc::now());

    let updated = model.update(&state.db).await?;
    Ok(Json(StageResponse::from(updated)))
}

#[utoipa::path(
    post,
    path = "/admin/stages/{id}/status",
    tag = "Stages",
    operation_id = "setStageStatus",
    summary = "Advance a stage",
    description = "Only `upcoming -> active` and `active -> closed` are allowed. Requires `stage:manage` permission.",
    params(("id" = i32, Path, description = "Stage ID")),
    request_body = StageStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = StageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Stage not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Transition not allowed (INVALID_TRANSITION)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(stage_id = id))]
pub async fn set_stage_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<StageStatusRequest>,
) -> Result<Json<StageResponse>, AppError> {
    auth_user.require_permission("stage:manage")?;

    let existing = find_stage(&state.db, id).await?;
    let invalid = || AppError::InvalidTransition {
        from: existing.status.as_str(),
        to: payload.status.as_str(),
    };
    if !existing.status.can_transition_to(payload.status) {
        return Err(invalid());
    }

    let result = stage::Entity::update_many()
        .col_expr(stage::Column::Status, Expr::value(payload.status))
        .col_expr(stage::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stage::Column::Id.eq(id))
        .filter(stage::Column::Status.eq(existing.status))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(invalid());
    }

    info!(stage_id = id, from = %existing.status, to = %payload.status, "Stage status changed");
    Ok(Json(StageResponse::from(find_stage(&state.db, id).await?)))
}

#[utoipa::path(
    get,
    path = "/admin/stages/{id}/submissions",
    tag = "Review",
    operation_id = "listStageSubmissions",
    summary = "List a stage's submissions",
    description = "Requires `submission:review` permission.",
    params(("id" = i32, Path, description = "Stage ID"), StageSubmissionListQuery),
    responses(
        (status = 200, description = "Submissions", body = StageSubmissionListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Stage not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(stage_id = id))]
pub async fn list_stage_submissions(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<StageSubmissionListQuery>,
) -> Result<Json<StageSubmissionListResponse>, AppError> {
    auth_user.require_permission("submission:review")?;
    find_stage(&state.db, id).await?;

    let (page, per_page) = Pagination::clamp(query.page, query.per_page);

    let mut select = stage_submission::Entity::find()
        .filter(stage_submission::Column::StageId.eq(id));
    if let Some(status) = query.status {
        select = select.filter(stage_submission::Column::Status.eq(status));
    }

    let total = select.clone().count(&state.db).await?;

    let rows = select
        .find_also_related(applicant::Entity)
        .order_by_asc(stage_submission::Column::SubmittedAt)
        .order_by_asc(stage_submission::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let data = rows
        .into_iter()
        .map(|(submission, applicant)| {
            let (registration_id, name) = applicant
                .map(|a| (a.registration_id, a.name))
                .unwrap_or_default();
            ReviewSubmissionResponse::new(submission, registration_id, name)
        })
        .collect();

    Ok(Json(StageSubmissionListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

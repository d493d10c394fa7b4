use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use common::ApplicantStatus;
use common::secret::generate_readable_id;
use sea_orm::*;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entity::applicant;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::applicant::{RegisterRequest, RegisterResponse, validate_register_request};
use crate::notification::{Dispatcher, messages};
use crate::state::AppState;

/// Attempts at drawing an unused registration ID.
const REGISTRATION_ID_ATTEMPTS: usize = 3;

/// Which contact field, if any, already belongs to another applicant.
async fn duplicate_field<C: ConnectionTrait>(
    db: &C,
    email: &str,
    mobile: &str,
) -> Result<Option<&'static str>, DbErr> {
    let email_taken = applicant::Entity::find()
        .filter(applicant::Column::Email.eq(email))
        .count(db)
        .await?
        > 0;
    if email_taken {
        return Ok(Some("email"));
    }
    let mobile_taken = applicant::Entity::find()
        .filter(applicant::Column::Mobile.eq(mobile))
        .count(db)
        .await?
        > 0;
    Ok(mobile_taken.then_some("mobile"))
}

#[utoipa::path(
    post,
    path = "/register",
    tag = "Registration",
    operation_id = "register",
    summary = "Register as an applicant",
    description = "Validates every field and reports all problems at once in `fields`. An email or mobile number that is already registered fails with `DUPLICATE` and `field` naming it. A confirmation mail is sent on success.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Applicant registered", body = RegisterResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Email or mobile already registered (DUPLICATE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reg = validate_register_request(payload)?;

    if let Some(field) = duplicate_field(&state.db, &reg.email, &reg.mobile).await? {
        return Err(AppError::Duplicate { field });
    }

    let mut created = None;
    for _ in 0..REGISTRATION_ID_ATTEMPTS {
        let now = Utc::now();
        let model = applicant::ActiveModel {
            id: Set(Uuid::new_v4()),
            registration_id: Set(generate_readable_id("HX", 8)),
            user_id: Set(None),
            name: Set(reg.name.clone()),
            email: Set(reg.email.clone()),
            mobile: Set(reg.mobile.clone()),
            student_id: Set(reg.student_id.clone()),
            course: Set(reg.course.clone()),
            year_of_graduation: Set(reg.year_of_graduation),
            college_name: Set(reg.college_name.clone()),
            linkedin_profile: Set(reg.linkedin_profile.clone()),
            status: Set(ApplicantStatus::Registered),
            submission_deadline: Set(None),
            submission_enabled: Set(false),
            selected_by: Set(None),
            selected_at: Set(None),
            confirmation_token: Set(None),
            confirmed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match model.insert(&state.db).await {
            Ok(inserted) => {
                created = Some(inserted);
                break;
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // Lost a race on email/mobile, or drew a registration ID already in use
                if let Some(field) = duplicate_field(&state.db, &reg.email, &reg.mobile).await? {
                    tracing::debug!("Registration race: unique constraint caught on insert");
                    return Err(AppError::Duplicate { field });
                }
                warn!("Registration ID collision, drawing another");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let applicant = created
        .ok_or_else(|| AppError::Internal("Could not allocate a registration ID".into()))?;

    info!(
        applicant_id = %applicant.id,
        registration_id = %applicant.registration_id,
        "Applicant registered"
    );

    Dispatcher::new(&state.db, state.notifier.as_ref())
        .dispatch(&messages::registration_received(&applicant))
        .await;

    Ok((StatusCode::CREATED, Json(RegisterResponse::from(applicant))))
}

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use common::ApplicantStatus;
use common::identity::{is_valid_email, is_valid_mobile, normalize_identifier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::applicant;
use crate::error::AppError;

use super::shared::{Pagination, double_option, is_http_url};
use super::stage::StageResponse;
use super::submission::SubmissionResponse;

/// Request body for applicant registration.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    /// Full name (1-100 characters).
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[schema(example = "asha.rao@example.edu")]
    pub email: String,
    /// 10-15 digits, optional leading `+`. Spaces and dashes are ignored.
    #[schema(example = "+91 98765 43210")]
    pub mobile: String,
    #[schema(example = "CS2021-114")]
    pub student_id: String,
    #[schema(example = "B.Tech Computer Science")]
    pub course: String,
    #[schema(example = 2026)]
    pub year_of_graduation: i32,
    #[schema(example = "National Institute of Technology")]
    pub college_name: String,
    #[schema(example = "https://www.linkedin.com/in/asharao")]
    pub linkedin_profile: Option<String>,
}

/// A registration that passed validation, in stored form.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub student_id: String,
    pub course: String,
    pub year_of_graduation: i32,
    pub college_name: String,
    pub linkedin_profile: Option<String>,
}

fn check_text(
    fields: &mut BTreeMap<&'static str, String>,
    field: &'static str,
    value: &str,
    max: usize,
) -> String {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > max {
        fields.insert(field, format!("{field} must be 1-{max} characters"));
    }
    value.to_string()
}

/// Validate every field at once and normalize the contact details.
pub fn validate_register_request(payload: RegisterRequest) -> Result<ValidRegistration, AppError> {
    let mut fields = BTreeMap::new();

    let name = check_text(&mut fields, "name", &payload.name, 100);
    let student_id = check_text(&mut fields, "student_id", &payload.student_id, 50);
    let course = check_text(&mut fields, "course", &payload.course, 100);
    let college_name = check_text(&mut fields, "college_name", &payload.college_name, 200);

    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) || email.chars().count() > 254 {
        fields.insert("email", "email must be a valid email address".to_string());
    }

    let mobile = normalize_identifier(&payload.mobile).unwrap_or_default();
    if !is_valid_mobile(&mobile) {
        fields.insert(
            "mobile",
            "mobile must be 10-15 digits with an optional leading +".to_string(),
        );
    }

    let this_year = Utc::now().year();
    if !(this_year - 10..=this_year + 10).contains(&payload.year_of_graduation) {
        fields.insert(
            "year_of_graduation",
            format!(
                "year_of_graduation must be between {} and {}",
                this_year - 10,
                this_year + 10
            ),
        );
    }

    let linkedin_profile = payload
        .linkedin_profile
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    if let Some(profile) = &linkedin_profile
        && !(is_http_url(profile) && profile.contains("linkedin.com/"))
    {
        fields.insert("linkedin_profile", "linkedin_profile must be a LinkedIn URL".to_string());
    }

    AppError::from_fields(fields)?;

    Ok(ValidRegistration {
        name,
        email,
        mobile,
        student_id,
        course,
        year_of_graduation: payload.year_of_graduation,
        college_name,
        linkedin_profile,
    })
}

/// Successful registration response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub id: Uuid,
    /// Quote this ID in any correspondence.
    #[schema(example = "HX-7KQ2M9PA")]
    pub registration_id: String,
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[schema(example = "asha.rao@example.edu")]
    pub email: String,
    pub status: ApplicantStatus,
}

impl From<applicant::Model> for RegisterResponse {
    fn from(a: applicant::Model) -> Self {
        Self {
            id: a.id,
            registration_id: a.registration_id,
            name: a.name,
            email: a.email,
            status: a.status,
        }
    }
}

/// Applicant profile. The confirmation token is never exposed.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ApplicantResponse {
    pub id: Uuid,
    #[schema(example = "HX-7KQ2M9PA")]
    pub registration_id: String,
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[schema(example = "asha.rao@example.edu")]
    pub email: String,
    #[schema(example = "+919876543210")]
    pub mobile: String,
    pub student_id: String,
    pub course: String,
    #[schema(example = 2026)]
    pub year_of_graduation: i32,
    pub college_name: String,
    pub linkedin_profile: Option<String>,
    pub status: ApplicantStatus,
    pub submission_enabled: bool,
    /// Overrides the stage end time when set.
    pub submission_deadline: Option<DateTime<Utc>>,
    pub selected_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    #[schema(example = "2025-09-01T08:00:00Z")]
    pub created_at: DateTime<Utc>,
}

impl From<applicant::Model> for ApplicantResponse {
    fn from(a: applicant::Model) -> Self {
        Self {
            id: a.id,
            registration_id: a.registration_id,
            name: a.name,
            email: a.email,
            mobile: a.mobile,
            student_id: a.student_id,
            course: a.course,
            year_of_graduation: a.year_of_graduation,
            college_name: a.college_name,
            linkedin_profile: a.linkedin_profile,
            status: a.status,
            submission_enabled: a.submission_enabled,
            submission_deadline: a.submission_deadline,
            selected_at: a.selected_at,
            confirmed_at: a.confirmed_at,
            created_at: a.created_at,
        }
    }
}

/// Query parameters for listing applicants.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ApplicantListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Case-insensitive match on name, email, mobile or registration ID.
    #[param(example = "asha")]
    pub search: Option<String>,
    /// Filter by status.
    pub status: Option<ApplicantStatus>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ApplicantListResponse {
    pub data: Vec<ApplicantResponse>,
    pub pagination: Pagination,
}

/// Request body for admin edits. Absent fields are left unchanged.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateApplicantRequest {
    #[schema(example = "Asha Rao")]
    pub name: Option<String>,
    pub submission_enabled: Option<bool>,
    /// Set to null to fall back to the stage end time.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub submission_deadline: Option<Option<DateTime<Utc>>>,
}

/// Request body for confirming participation with the mailed code.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ConfirmParticipationRequest {
    /// Confirmation code from the selection email.
    pub code: String,
}

/// Everything the applicant dashboard shows.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ApplicantDashboard {
    pub applicant: ApplicantResponse,
    pub submissions: Vec<SubmissionResponse>,
    pub stages: Vec<StageResponse>,
}

/// Per-stage counters for the admin dashboard.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StageStats {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Idea round")]
    pub name: String,
    pub status: common::StageStatus,
    /// Applicants with a submission in this stage.
    #[schema(example = 42)]
    pub participants: u64,
    /// Submission counts keyed by status.
    #[schema(value_type = Object)]
    pub submissions_by_status: BTreeMap<String, u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DashboardStats {
    #[schema(example = 120)]
    pub total_applicants: u64,
    /// Applicant counts keyed by status.
    #[schema(value_type = Object)]
    pub applicants_by_status: BTreeMap<String, u64>,
    pub stages: Vec<StageStats>,
}

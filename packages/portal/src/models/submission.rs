use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Decision, SubmissionStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::stage_submission::{self, DocumentRef};
use crate::error::AppError;

use super::shared::{Pagination, is_http_url};

/// Upper bound on documents attached to one submission.
pub const MAX_DOCUMENTS: usize = 10;

/// Upper bound on rows in one bulk decision import.
pub const MAX_BULK_ROWS: usize = 1000;

/// A document linked from a submission.
#[derive(Clone, Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DocumentDto {
    /// Display name (1-128 characters).
    #[schema(example = "Pitch deck")]
    pub name: String,
    /// Absolute http(s) URL.
    #[schema(example = "https://drive.example.com/pitch.pdf")]
    pub url: String,
}

impl From<DocumentDto> for DocumentRef {
    fn from(dto: DocumentDto) -> Self {
        Self {
            name: dto.name.trim().to_string(),
            url: dto.url.trim().to_string(),
        }
    }
}

impl From<DocumentRef> for DocumentDto {
    fn from(doc: DocumentRef) -> Self {
        Self {
            name: doc.name,
            url: doc.url,
        }
    }
}

/// Documents as stored, in their original order. Malformed JSON reads as empty.
pub fn documents_of(model: &stage_submission::Model) -> Vec<DocumentDto> {
    serde_json::from_value::<Vec<DocumentRef>>(model.documents.clone())
        .unwrap_or_default()
        .into_iter()
        .map(DocumentDto::from)
        .collect()
}

/// Request body for saving or submitting a stage submission.
///
/// Absent fields leave the stored value unchanged.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct SubmissionEditRequest {
    /// Repository URL; must point at `https://github.com/<owner>/<repo>`.
    #[schema(example = "https://github.com/team-rocket/hackathon-entry")]
    pub github_url: Option<String>,
    /// Replaces the whole document list when present.
    pub documents: Option<Vec<DocumentDto>>,
}

/// Returns true for `https://github.com/<owner>/<repo>` style URLs.
pub fn is_github_url(url: &str) -> bool {
    let Some(path) = url.strip_prefix("https://github.com/") else {
        return false;
    };
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    parts.next().is_some() && parts.next().is_some() && !url.chars().any(char::is_whitespace)
}

pub fn validate_submission_edit(payload: &SubmissionEditRequest) -> Result<(), AppError> {
    let mut fields = BTreeMap::new();

    if let Some(url) = &payload.github_url
        && !is_github_url(url.trim())
    {
        fields.insert(
            "github_url",
            "github_url must be a https://github.com/<owner>/<repo> URL".to_string(),
        );
    }

    if let Some(docs) = &payload.documents {
        if docs.len() > MAX_DOCUMENTS {
            fields.insert(
                "documents",
                format!("At most {MAX_DOCUMENTS} documents are allowed"),
            );
        } else if let Some(bad) = docs.iter().position(|d| {
            let name = d.name.trim();
            name.is_empty() || name.chars().count() > 128 || !is_http_url(d.url.trim())
        }) {
            fields.insert(
                "documents",
                format!("Document {} needs a 1-128 character name and an http(s) URL", bad + 1),
            );
        }
    }

    AppError::from_fields(fields)
}

/// A submission as its owner sees it.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = 1)]
    pub stage_id: i32,
    #[schema(example = "https://github.com/team-rocket/hackathon-entry")]
    pub github_url: Option<String>,
    pub documents: Vec<DocumentDto>,
    pub status: SubmissionStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Review score (0-100), once decided.
    #[schema(example = 87)]
    pub score: Option<i32>,
    pub feedback: Option<String>,
    pub is_selected: bool,
    #[schema(example = "2025-10-01T14:30:00Z")]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<stage_submission::Model> for SubmissionResponse {
    fn from(m: stage_submission::Model) -> Self {
        Self {
            documents: documents_of(&m),
            id: m.id,
            stage_id: m.stage_id,
            github_url: m.github_url,
            status: m.status,
            submitted_at: m.submitted_at,
            reviewed_at: m.reviewed_at,
            score: m.score,
            feedback: m.feedback,
            is_selected: m.is_selected,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// A submission as reviewers see it, including internal notes.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ReviewSubmissionResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub applicant_id: Uuid,
    #[schema(example = "HX-7KQ2M9PA")]
    pub registration_id: String,
    #[schema(example = "Asha Rao")]
    pub applicant_name: String,
    #[schema(example = 1)]
    pub stage_id: i32,
    pub github_url: Option<String>,
    pub documents: Vec<DocumentDto>,
    pub status: SubmissionStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Admin user who picked the submission up.
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub score: Option<i32>,
    pub feedback: Option<String>,
    pub is_selected: bool,
    pub updated_at: DateTime<Utc>,
}

impl ReviewSubmissionResponse {
    pub fn new(m: stage_submission::Model, registration_id: String, applicant_name: String) -> Self {
        Self {
            documents: documents_of(&m),
            id: m.id,
            applicant_id: m.applicant_id,
            registration_id,
            applicant_name,
            stage_id: m.stage_id,
            github_url: m.github_url,
            status: m.status,
            submitted_at: m.submitted_at,
            reviewed_by: m.reviewed_by,
            reviewed_at: m.reviewed_at,
            review_notes: m.review_notes,
            score: m.score,
            feedback: m.feedback,
            is_selected: m.is_selected,
            updated_at: m.updated_at,
        }
    }
}

/// Query parameters for listing a stage's submissions.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct StageSubmissionListQuery {
    /// Filter by status.
    pub status: Option<SubmissionStatus>,
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StageSubmissionListResponse {
    pub data: Vec<ReviewSubmissionResponse>,
    pub pagination: Pagination,
}

/// Request body for recording a review decision.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct DecisionRequest {
    pub decision: Decision,
    /// 0-100.
    #[schema(example = 87)]
    pub score: Option<i32>,
    /// Shown to the applicant.
    #[schema(example = "Strong prototype, thin market analysis.")]
    pub feedback: Option<String>,
    /// Internal, never shown to the applicant.
    pub notes: Option<String>,
}

pub fn validate_score(score: Option<i32>) -> Result<(), AppError> {
    if let Some(score) = score
        && !(0..=100).contains(&score)
    {
        return Err(AppError::field("score", "score must be between 0 and 100"));
    }
    Ok(())
}

/// One row of a bulk decision import.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct BulkDecisionRow {
    /// Registration ID, email or mobile number.
    #[schema(example = "HX-7KQ2M9PA")]
    pub applicant: String,
    #[schema(example = 1)]
    pub stage_id: i32,
    /// `accepted` or `rejected`.
    pub decision: Decision,
    pub score: Option<i32>,
    pub feedback: Option<String>,
}

/// Request body for bulk decision import.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct BulkDecisionRequest {
    /// 1-1000 rows, applied in order.
    pub rows: Vec<BulkDecisionRow>,
}

/// Why a row was not applied.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BulkRowError {
    /// Same codes as the top-level error body.
    #[schema(example = "NOT_FOUND")]
    pub code: &'static str,
    #[schema(example = "Applicant not found")]
    pub message: String,
}

impl From<&crate::error::AppError> for BulkRowError {
    fn from(err: &crate::error::AppError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one row.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BulkRowResult {
    /// 1-based position in the request.
    #[schema(example = 2)]
    pub row: usize,
    #[schema(example = "HX-7KQ2M9PA")]
    pub applicant: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkRowError>,
}

/// Report for a bulk decision import. Partial success is normal.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BulkDecisionReport {
    #[schema(example = 3)]
    pub total: usize,
    #[schema(example = 2)]
    pub succeeded: usize,
    #[schema(example = 1)]
    pub failed: usize,
    pub results: Vec<BulkRowResult>,
}

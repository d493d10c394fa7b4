use common::SubmissionStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A document attached to a submission.
/// Stored as JSON array in the database, order preserved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Display name (e.g., "Pitch deck").
    pub name: String,
    /// Where the document lives.
    pub url: String,
}

/// One applicant's entry for one stage. At most one row per (applicant, stage).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub applicant_id: Uuid,
    #[sea_orm(belongs_to, from = "applicant_id", to = "id")]
    pub applicant: HasOne<super::applicant::Entity>,

    pub stage_id: i32,
    #[sea_orm(belongs_to, from = "stage_id", to = "id")]
    pub stage: HasOne<super::stage::Entity>,

    pub github_url: Option<String>,
    /// Array of {name, url} objects.
    #[sea_orm(column_type = "Json")]
    pub documents: serde_json::Value,

    pub status: SubmissionStatus,
    /// Set on every move into `submitted`.
    pub submitted_at: Option<DateTimeUtc>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTimeUtc>,
    pub review_notes: Option<String>,
    /// 0-100.
    pub score: Option<i32>,
    pub feedback: Option<String>,
    pub is_selected: bool,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

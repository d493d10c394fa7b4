use common::ApplicantStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "applicant")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Externally visible, immutable once assigned.
    #[sea_orm(unique)]
    pub registration_id: String,
    /// Linked admin account, if any.
    pub user_id: Option<i32>,

    pub name: String,
    /// Stored lower-cased.
    #[sea_orm(unique)]
    pub email: String,
    /// Stored normalized (digits with optional leading `+`).
    #[sea_orm(unique)]
    pub mobile: String,
    pub student_id: String,
    pub course: String,
    pub year_of_graduation: i32,
    pub college_name: String,
    pub linkedin_profile: Option<String>,

    pub status: ApplicantStatus,
    /// Overrides the stage end time when set.
    pub submission_deadline: Option<DateTimeUtc>,
    pub submission_enabled: bool,
    pub selected_by: Option<i32>,
    pub selected_at: Option<DateTimeUtc>,
    #[sea_orm(unique)]
    pub confirmation_token: Option<String>,
    pub confirmed_at: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub sessions: HasMany<super::applicant_session::Entity>,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::stage_submission::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

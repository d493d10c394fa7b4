use common::StageStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A competition round.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    pub description: String, // in Markdown
    /// Display order among stages.
    pub position: i32,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,
    pub status: StageStatus,

    #[sea_orm(has_many)]
    pub submissions: HasMany<super::stage_submission::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

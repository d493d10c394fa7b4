use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "applicant_session")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// SHA-256 hex of the bearer token handed to the client.
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub applicant_id: Uuid,
    #[sea_orm(belongs_to, from = "applicant_id", to = "id")]
    pub applicant: HasOne<super::applicant::Entity>,

    /// Fixed at creation; validation never extends it.
    pub expires_at: DateTimeUtc,
    pub last_activity: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

use common::OtpPurpose;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "otp_verification")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Normalized email or mobile number.
    #[sea_orm(indexed)]
    pub identifier: String,
    /// SHA-256 hex of the code. The raw code is never stored.
    #[serde(skip_serializing)]
    pub code_hash: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTimeUtc,
    /// One-shot: set once, never cleared.
    pub verified: bool,
    /// Wrong guesses so far.
    pub attempts: i32,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

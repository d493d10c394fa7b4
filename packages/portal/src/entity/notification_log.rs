use common::NotificationChannel;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Record of one delivery attempt through the notification dispatcher.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
    /// Passcodes are redacted before the body is stored.
    pub body: String,
    pub delivered: bool,
    pub error: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

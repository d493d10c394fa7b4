use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role names an admin account may hold.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_JURY: &str = "jury";

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password: String,
    /// `admin` or `jury`.
    pub role: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

/// Static role-permission mappings.
const ROLE_PERMISSIONS: &[(&str, &str)] = &[
    // Admin: all permissions
    (ROLE_ADMIN, "applicant:manage"),
    (ROLE_ADMIN, "stage:manage"),
    (ROLE_ADMIN, "submission:review"),
    (ROLE_ADMIN, "notification:send"),
    // Jury
    (ROLE_JURY, "submission:review"),
];

/// Permissions granted to a role. Unknown roles get none.
pub fn permissions_for(role: &str) -> Vec<String> {
    ROLE_PERMISSIONS
        .iter()
        .filter(|(r, _)| *r == role)
        .map(|(_, p)| (*p).to_string())
        .collect()
}

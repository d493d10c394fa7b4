#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an applicant stands in the selection process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantStatus {
    /// Registration received.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "registered"))]
    Registered,
    /// Shortlisted by an admin, waiting for the applicant to confirm.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "selected"))]
    Selected,
    /// Applicant confirmed participation.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "confirmed"))]
    Confirmed,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "not_selected"))]
    NotSelected,
    /// Soft-deleted. Never leaves this state.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "withdrawn"))]
    Withdrawn,
}

impl ApplicantStatus {
    pub const ALL: &'static [ApplicantStatus] = &[
        Self::Registered,
        Self::Selected,
        Self::Confirmed,
        Self::NotSelected,
        Self::Withdrawn,
    ];

    pub fn can_transition_to(&self, next: ApplicantStatus) -> bool {
        use ApplicantStatus::*;
        matches!(
            (self, next),
            (Registered, Selected | NotSelected | Withdrawn)
                | (Selected, Confirmed | NotSelected | Withdrawn)
                | (NotSelected, Selected | Withdrawn)
                | (Confirmed, Withdrawn)
        )
    }

    /// Withdrawn applicants can no longer sign in.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Withdrawn)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Selected => "selected",
            Self::Confirmed => "confirmed",
            Self::NotSelected => "not_selected",
            Self::Withdrawn => "withdrawn",
        }
    }
}

impl fmt::Display for ApplicantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

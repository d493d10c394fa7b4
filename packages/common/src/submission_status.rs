#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a stage submission.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Being edited by the applicant.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "draft"))]
    Draft,
    /// Handed in, waiting for a reviewer.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "submitted"))]
    Submitted,
    /// Picked up by a reviewer.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "under_review"))]
    UnderReview,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "accepted"))]
    Accepted,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rejected"))]
    Rejected,
    /// Returned to the applicant for another round of edits.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "needs_revision"))]
    NeedsRevision,
}

impl SubmissionStatus {
    /// All possible status values.
    pub const ALL: &'static [SubmissionStatus] = &[
        Self::Draft,
        Self::Submitted,
        Self::UnderReview,
        Self::Accepted,
        Self::Rejected,
        Self::NeedsRevision,
    ];

    /// Returns true for states that admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    /// Returns true while the applicant may still edit the submission contents.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// The single-step transitions of the review workflow.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, UnderReview)
                | (UnderReview, Accepted | Rejected | NeedsRevision)
                | (NeedsRevision, Draft)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::NeedsRevision => "needs_revision",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's verdict on a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
    NeedsRevision,
}

impl Decision {
    /// The submission status this decision moves to.
    pub fn target_status(&self) -> SubmissionStatus {
        match self {
            Self::Accepted => SubmissionStatus::Accepted,
            Self::Rejected => SubmissionStatus::Rejected,
            Self::NeedsRevision => SubmissionStatus::NeedsRevision,
        }
    }

    /// States a bulk import may decide from.
    ///
    /// Bulk imports skip the explicit review step, so final verdicts are
    /// accepted straight from `submitted` as well. Revision requests are not
    /// importable.
    pub fn bulk_sources(&self) -> &'static [SubmissionStatus] {
        match self {
            Self::Accepted | Self::Rejected => {
                &[SubmissionStatus::Submitted, SubmissionStatus::UnderReview]
            }
            Self::NeedsRevision => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.target_status().as_str()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

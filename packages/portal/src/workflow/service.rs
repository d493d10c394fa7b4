use chrono::{DateTime, Utc};
use common::{ApplicantStatus, Decision, SubmissionStatus};
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::*;
use tracing::info;
use uuid::Uuid;

use crate::entity::stage_submission::DocumentRef;
use crate::entity::{applicant, stage, stage_submission};
use crate::error::AppError;
use crate::models::submission::{
    DecisionRequest, DocumentDto, SubmissionEditRequest, validate_score, validate_submission_edit,
};

/// The moment after which an applicant can no longer submit for a stage.
///
/// A per-applicant deadline overrides the stage window.
pub fn effective_deadline(applicant: &applicant::Model, stage: &stage::Model) -> DateTime<Utc> {
    applicant.submission_deadline.unwrap_or(stage.end_time)
}

pub struct SubmissionWorkflow<'a, C: ConnectionTrait> {
    pub(super) conn: &'a C,
}

impl<'a, C: ConnectionTrait> SubmissionWorkflow<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Create the draft on first use, otherwise edit it while it is still a draft.
    pub async fn save_draft(
        &self,
        applicant: &applicant::Model,
        stage_id: i32,
        edits: SubmissionEditRequest,
    ) -> Result<stage_submission::Model, AppError> {
        validate_submission_edit(&edits)?;

        let stage = self.find_stage(stage_id).await?;
        if !stage.status.accepts_submissions() {
            return Err(AppError::StageClosed);
        }
        if Utc::now() > effective_deadline(applicant, &stage) {
            return Err(AppError::DeadlinePassed);
        }

        let current = match self.find_for(applicant.id, stage_id).await? {
            Some(existing) => existing,
            None => return self.create_draft(applicant.id, stage_id, edits).await,
        };

        if !current.status.is_editable() {
            return Err(AppError::InvalidTransition {
                from: current.status.as_str(),
                to: SubmissionStatus::Draft.as_str(),
            });
        }

        let mut update = stage_submission::Entity::update_many()
            .col_expr(stage_submission::Column::UpdatedAt, Expr::value(Utc::now()));
        for (col, value) in edit_columns(edits)? {
            update = update.col_expr(col, value);
        }
        let result = update
            .filter(stage_submission::Column::Id.eq(current.id))
            .filter(stage_submission::Column::Status.eq(SubmissionStatus::Draft))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(self.conflict(current.id, SubmissionStatus::Draft).await);
        }
        self.find_submission(current.id).await
    }

    /// Hand in the applicant's submission for a stage (`draft -> submitted`).
    ///
    /// All guards run before anything is written.
    pub async fn submit(
        &self,
        applicant: &applicant::Model,
        stage_id: i32,
        edits: SubmissionEditRequest,
    ) -> Result<stage_submission::Model, AppError> {
        validate_submission_edit(&edits)?;

        let stage = self.find_stage(stage_id).await?;
        if !stage.status.accepts_submissions() {
            return Err(AppError::StageClosed);
        }
        let now = Utc::now();
        if now > effective_deadline(applicant, &stage) {
            return Err(AppError::DeadlinePassed);
        }
        if !applicant.submission_enabled {
            return Err(AppError::SubmissionsDisabled);
        }

        let existing = self.find_for(applicant.id, stage_id).await?;
        if let Some(current) = &existing
            && !current.status.can_transition_to(SubmissionStatus::Submitted)
        {
            return Err(AppError::InvalidTransition {
                from: current.status.as_str(),
                to: SubmissionStatus::Submitted.as_str(),
            });
        }

        let has_repo = edits.github_url.is_some()
            || existing.as_ref().is_some_and(|s| s.github_url.is_some());
        if !has_repo {
            return Err(AppError::field(
                "github_url",
                "A GitHub repository is required to submit",
            ));
        }

        let current = match existing {
            Some(current) => current,
            None => {
                self.create_draft(applicant.id, stage_id, SubmissionEditRequest::default())
                    .await?
            }
        };

        let mut changes = edit_columns(edits)?;
        changes.push((stage_submission::Column::SubmittedAt, Expr::value(now)));

        let submitted = self
            .transition(
                current.id,
                &[SubmissionStatus::Draft],
                SubmissionStatus::Submitted,
                changes,
            )
            .await?;

        info!(
            applicant_id = %applicant.id,
            stage_id,
            submission_id = submitted.id,
            "Submission submitted"
        );
        Ok(submitted)
    }

    /// Send a returned submission back to draft (`needs_revision -> draft`).
    pub async fn reopen(
        &self,
        applicant: &applicant::Model,
        stage_id: i32,
    ) -> Result<stage_submission::Model, AppError> {
        let stage = self.find_stage(stage_id).await?;
        if !stage.status.accepts_submissions() {
            return Err(AppError::StageClosed);
        }
        if Utc::now() > effective_deadline(applicant, &stage) {
            return Err(AppError::DeadlinePassed);
        }

        let current = self
            .find_for(applicant.id, stage_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;

        let reopened = self
            .transition(
                current.id,
                &[SubmissionStatus::NeedsRevision],
                SubmissionStatus::Draft,
                Vec::new(),
            )
            .await?;

        info!(
            applicant_id = %applicant.id,
            stage_id,
            submission_id = reopened.id,
            "Submission reopened"
        );
        Ok(reopened)
    }

    /// A reviewer picks up a submission (`submitted -> under_review`).
    pub async fn start_review(
        &self,
        submission_id: i32,
        reviewer_id: i32,
    ) -> Result<stage_submission::Model, AppError> {
        self.ensure_owner_active(submission_id, SubmissionStatus::UnderReview)
            .await?;
        let reviewed = self
            .transition(
                submission_id,
                &[SubmissionStatus::Submitted],
                SubmissionStatus::UnderReview,
                vec![(stage_submission::Column::ReviewedBy, Expr::value(reviewer_id))],
            )
            .await?;

        info!(submission_id, reviewer_id, "Review started");
        Ok(reviewed)
    }

    /// Record a reviewer's decision on a submission under review.
    pub async fn decide(
        &self,
        submission_id: i32,
        reviewer_id: i32,
        request: DecisionRequest,
    ) -> Result<stage_submission::Model, AppError> {
        validate_score(request.score)?;
        self.ensure_owner_active(submission_id, request.decision.target_status())
            .await?;

        let mut changes = decision_columns(
            reviewer_id,
            request.decision,
            request.score,
            request.feedback,
        );
        changes.push((
            stage_submission::Column::ReviewNotes,
            Expr::value(request.notes),
        ));

        let decided = self
            .transition(
                submission_id,
                &[SubmissionStatus::UnderReview],
                request.decision.target_status(),
                changes,
            )
            .await?;

        info!(submission_id, reviewer_id, decision = %request.decision, "Submission decided");
        Ok(decided)
    }

    /// Apply `to` if the submission is currently in one of `from`.
    ///
    /// `from` must only hold states the transition table allows out of.
    pub(super) async fn transition(
        &self,
        submission_id: i32,
        from: &[SubmissionStatus],
        to: SubmissionStatus,
        changes: Vec<(stage_submission::Column, SimpleExpr)>,
    ) -> Result<stage_submission::Model, AppError> {
        let mut update = stage_submission::Entity::update_many()
            .col_expr(stage_submission::Column::Status, Expr::value(to))
            .col_expr(stage_submission::Column::UpdatedAt, Expr::value(Utc::now()));
        for (col, value) in changes {
            update = update.col_expr(col, value);
        }

        let result = update
            .filter(stage_submission::Column::Id.eq(submission_id))
            .filter(stage_submission::Column::Status.is_in(from.iter().copied()))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(self.conflict(submission_id, to).await);
        }

        self.find_submission(submission_id).await
    }

    /// Submissions of withdrawn applicants are frozen.
    async fn ensure_owner_active(
        &self,
        submission_id: i32,
        to: SubmissionStatus,
    ) -> Result<(), AppError> {
        let submission = self.find_submission(submission_id).await?;
        let owner = applicant::Entity::find_by_id(submission.applicant_id)
            .one(self.conn)
            .await?;
        match owner {
            Some(owner) => ensure_not_withdrawn(&owner, to),
            None => Err(AppError::NotFound("Applicant not found".into())),
        }
    }

    /// Explain why a conditional update matched nothing.
    async fn conflict(&self, submission_id: i32, to: SubmissionStatus) -> AppError {
        match self.find_submission(submission_id).await {
            Ok(current) => AppError::InvalidTransition {
                from: current.status.as_str(),
                to: to.as_str(),
            },
            Err(e) => e,
        }
    }

    async fn create_draft(
        &self,
        applicant_id: Uuid,
        stage_id: i32,
        edits: SubmissionEditRequest,
    ) -> Result<stage_submission::Model, AppError> {
        let now = Utc::now();
        let documents = documents_json(edits.documents.unwrap_or_default())?;

        let model = stage_submission::ActiveModel {
            applicant_id: Set(applicant_id),
            stage_id: Set(stage_id),
            github_url: Set(edits.github_url.map(|u| u.trim().to_string())),
            documents: Set(documents),
            status: Set(SubmissionStatus::Draft),
            submitted_at: Set(None),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            review_notes: Set(None),
            score: Set(None),
            feedback: Set(None),
            is_selected: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match model.insert(self.conn).await {
            Ok(created) => {
                info!(%applicant_id, stage_id, submission_id = created.id, "Draft created");
                Ok(created)
            }
            // Another request created it first
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => self
                .find_for(applicant_id, stage_id)
                .await?
                .ok_or_else(|| AppError::Internal("Submission vanished after conflict".into())),
            Err(e) => Err(e.into()),
        }
    }

    pub(super) async fn find_stage(&self, stage_id: i32) -> Result<stage::Model, AppError> {
        stage::Entity::find_by_id(stage_id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Stage not found".into()))
    }

    pub async fn find_submission(
        &self,
        submission_id: i32,
    ) -> Result<stage_submission::Model, AppError> {
        stage_submission::Entity::find_by_id(submission_id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Submission not found".into()))
    }

    pub(super) async fn find_for(
        &self,
        applicant_id: Uuid,
        stage_id: i32,
    ) -> Result<Option<stage_submission::Model>, DbErr> {
        stage_submission::Entity::find()
            .filter(stage_submission::Column::ApplicantId.eq(applicant_id))
            .filter(stage_submission::Column::StageId.eq(stage_id))
            .one(self.conn)
            .await
    }
}

/// Withdrawal is final: nothing about the applicant's work may move afterwards.
pub(super) fn ensure_not_withdrawn(
    applicant: &applicant::Model,
    to: SubmissionStatus,
) -> Result<(), AppError> {
    if applicant.status == ApplicantStatus::Withdrawn {
        return Err(AppError::InvalidTransition {
            from: ApplicantStatus::Withdrawn.as_str(),
            to: to.as_str(),
        });
    }
    Ok(())
}

fn documents_json(docs: Vec<DocumentDto>) -> Result<serde_json::Value, AppError> {
    let docs: Vec<DocumentRef> = docs.into_iter().map(DocumentRef::from).collect();
    serde_json::to_value(docs)
        .map_err(|e| AppError::Internal(format!("Failed to encode documents: {e}")))
}

/// Column updates for the fields present in an edit.
fn edit_columns(
    edits: SubmissionEditRequest,
) -> Result<Vec<(stage_submission::Column, SimpleExpr)>, AppError> {
    let mut changes = Vec::new();
    if let Some(url) = edits.github_url {
        changes.push((
            stage_submission::Column::GithubUrl,
            Expr::value(Some(url.trim().to_string())),
        ));
    }
    if let Some(docs) = edits.documents {
        changes.push((
            stage_submission::Column::Documents,
            Expr::value(documents_json(docs)?),
        ));
    }
    Ok(changes)
}

/// Column updates shared by single and bulk decisions.
pub(super) fn decision_columns(
    reviewer_id: i32,
    decision: Decision,
    score: Option<i32>,
    feedback: Option<String>,
) -> Vec<(stage_submission::Column, SimpleExpr)> {
    vec![
        (stage_submission::Column::ReviewedBy, Expr::value(reviewer_id)),
        (stage_submission::Column::ReviewedAt, Expr::value(Utc::now())),
        (stage_submission::Column::Score, Expr::value(score)),
        (stage_submission::Column::Feedback, Expr::value(feedback)),
        (
            stage_submission::Column::IsSelected,
            Expr::value(decision == Decision::Accepted),
        ),
    ]
}

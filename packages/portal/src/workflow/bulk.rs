use common::identity::normalize_identifier;
use sea_orm::*;
use tracing::{info, warn};

use crate::entity::applicant;
use crate::error::AppError;
use crate::models::submission::{
    BulkDecisionReport, BulkDecisionRow, BulkRowError, BulkRowResult, MAX_BULK_ROWS,
    validate_score,
};

use super::SubmissionWorkflow;
use super::service::{decision_columns, ensure_not_withdrawn};

impl<'a, C: ConnectionTrait> SubmissionWorkflow<'a, C> {
    /// Apply imported decisions row by row.
    ///
    /// A failing row is reported and skipped; it never aborts the import.
    pub async fn bulk_decide(
        &self,
        reviewer_id: i32,
        rows: Vec<BulkDecisionRow>,
    ) -> Result<BulkDecisionReport, AppError> {
        if rows.is_empty() {
            return Err(AppError::field("rows", "rows must not be empty"));
        }
        if rows.len() > MAX_BULK_ROWS {
            return Err(AppError::field(
                "rows",
                format!("Too many rows: max {MAX_BULK_ROWS}"),
            ));
        }

        let total = rows.len();
        let mut results = Vec::with_capacity(total);

        for (index, row) in rows.into_iter().enumerate() {
            let label = row.applicant.clone();
            let outcome = self.apply_row(reviewer_id, row).await;
            results.push(BulkRowResult {
                row: index + 1,
                applicant: label,
                success: outcome.is_ok(),
                error: outcome.as_ref().err().map(BulkRowError::from),
            });
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = total - succeeded;
        if failed > 0 {
            warn!(total, succeeded, failed, "Bulk decision import partially applied");
        } else {
            info!(total, "Bulk decision import applied");
        }

        Ok(BulkDecisionReport {
            total,
            succeeded,
            failed,
            results,
        })
    }

    async fn apply_row(&self, reviewer_id: i32, row: BulkDecisionRow) -> Result<i32, AppError> {
        let sources = row.decision.bulk_sources();
        if sources.is_empty() {
            return Err(AppError::field(
                "decision",
                "Only accepted or rejected can be imported",
            ));
        }
        validate_score(row.score)?;

        let applicant = self
            .resolve_applicant(&row.applicant)
            .await?
            .ok_or_else(|| AppError::NotFound("Applicant not found".into()))?;
        ensure_not_withdrawn(&applicant, row.decision.target_status())?;

        let submission = self
            .find_for(applicant.id, row.stage_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;

        let decided = self
            .transition(
                submission.id,
                sources,
                row.decision.target_status(),
                decision_columns(reviewer_id, row.decision, row.score, row.feedback),
            )
            .await?;

        info!(
            applicant_id = %applicant.id,
            stage_id = row.stage_id,
            submission_id = decided.id,
            decision = %row.decision,
            "Imported decision applied"
        );
        Ok(decided.id)
    }

    /// Look an applicant up by registration ID, email or mobile number.
    async fn resolve_applicant(&self, reference: &str) -> Result<Option<applicant::Model>, DbErr> {
        let Some(normalized) = normalize_identifier(reference) else {
            return Ok(None);
        };
        applicant::Entity::find()
            .filter(
                Condition::any()
                    .add(applicant::Column::RegistrationId.eq(reference.trim().to_uppercase()))
                    .add(applicant::Column::Email.eq(normalized.as_str()))
                    .add(applicant::Column::Mobile.eq(normalized.as_str())),
            )
            .one(self.conn)
            .await
    }
}

use sea_orm::sea_query::{
    Index, IndexCreateStatement, MysqlQueryBuilder, OnConflict, PostgresQueryBuilder,
    SqliteQueryBuilder,
};
use sea_orm::*;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::entity::{admin_user, notification_log, otp_verification, stage_submission};
use crate::utils::hash;

/// Render an index statement for whichever backend the pool talks to.
fn index_sql(backend: DbBackend, stmt: &IndexCreateStatement) -> String {
    match backend {
        DbBackend::Postgres => stmt.to_string(PostgresQueryBuilder),
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(MysqlQueryBuilder),
    }
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't cover composite indexes, so they are created
/// here on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    // One submission per applicant per stage. Failing to create this one is fatal.
    let stmt = Index::create()
        .if_not_exists()
        .unique()
        .name("uq_stage_submission_applicant_stage")
        .table(stage_submission::Entity)
        .col(stage_submission::Column::ApplicantId)
        .col(stage_submission::Column::StageId)
        .to_owned();
    db.execute_unprepared(&index_sql(backend, &stmt)).await?;
    info!("Ensured index uq_stage_submission_applicant_stage exists");

    // Rate limiting and latest-code lookups:
    // SELECT ... FROM otp_verification WHERE identifier = ? AND purpose = ? ORDER BY created_at DESC
    let optional = [
        (
            "idx_otp_identifier_purpose_created",
            Index::create()
                .if_not_exists()
                .name("idx_otp_identifier_purpose_created")
                .table(otp_verification::Entity)
                .col(otp_verification::Column::Identifier)
                .col(otp_verification::Column::Purpose)
                .col(otp_verification::Column::CreatedAt)
                .to_owned(),
        ),
        (
            "idx_notification_log_created",
            Index::create()
                .if_not_exists()
                .name("idx_notification_log_created")
                .table(notification_log::Entity)
                .col(notification_log::Column::CreatedAt)
                .to_owned(),
        ),
    ];

    for (name, stmt) in optional {
        match db.execute_unprepared(&index_sql(backend, &stmt)).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}

/// Seed the bootstrap admin account when one is configured.
///
/// An existing account with the same email is left untouched.
pub async fn seed_bootstrap_admin(db: &DatabaseConnection, auth: &AuthConfig) -> Result<(), DbErr> {
    let (Some(email), Some(password)) = (
        auth.bootstrap_admin_email.as_deref(),
        auth.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    let password = hash::hash_password(password)
        .map_err(|e| DbErr::Custom(format!("Password hash error: {e}")))?;

    let model = admin_user::ActiveModel {
        email: Set(email.trim().to_lowercase()),
        name: Set("Administrator".into()),
        password: Set(password),
        role: Set(admin_user::ROLE_ADMIN.into()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = admin_user::Entity::insert(model)
        .on_conflict(
            OnConflict::column(admin_user::Column::Email)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(0) | Err(DbErr::RecordNotInserted) => {}
        Ok(_) => info!(email, "Seeded bootstrap admin"),
        Err(e) => return Err(e),
    }

    Ok(())
}

//! Route table. Each handler's path comes from its `#[utoipa::path]`.

use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::{admin, applicant, auth, notification, otp, registration, review, stage};
use crate::state::AppState;

/// Versioned API, mounted under `/api` by the caller.
pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/v1", v1_routes())
}

fn v1_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(public_routes())
        .merge(applicant_routes())
        .merge(admin_routes())
}

fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(registration::register))
        .routes(routes!(otp::request_otp))
        .routes(routes!(otp::verify_otp))
        .routes(routes!(applicant::confirm_by_code))
        .routes(routes!(stage::list_stages))
}

fn applicant_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(applicant::me))
        .routes(routes!(applicant::logout))
        .routes(routes!(applicant::confirm_participation))
        .routes(routes!(applicant::list_submissions))
        .routes(routes!(applicant::save_draft, applicant::submit))
        .routes(routes!(applicant::reopen))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(auth::login))
        .routes(routes!(auth::me))
        .routes(routes!(auth::request_password_reset))
        .routes(routes!(auth::confirm_password_reset))
        .routes(routes!(admin::list_applicants))
        .routes(routes!(admin::export_applicants))
        .routes(routes!(
            admin::get_applicant,
            admin::update_applicant,
            admin::withdraw_applicant
        ))
        .routes(routes!(admin::select_applicant))
        .routes(routes!(admin::reject_applicant))
        .routes(routes!(admin::dashboard_stats))
        .routes(routes!(stage::admin_list_stages, stage::create_stage))
        .routes(routes!(stage::update_stage))
        .routes(routes!(stage::set_stage_status))
        .routes(routes!(stage::list_stage_submissions))
        .routes(routes!(review::start_review))
        .routes(routes!(review::decide))
        .routes(routes!(review::bulk_decisions))
        .routes(routes!(
            notification::list_notifications,
            notification::broadcast
        ))
}

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;

use portal::entity::admin_user;
use portal::utils::hash::hash_password;

use crate::common::{ADMIN_EMAIL, ADMIN_PASSWORD, TestApp, routes};

async fn jury_token(app: &TestApp) -> String {
    admin_user::ActiveModel {
        email: Set("jury@hackathon.example".into()),
        name: Set("Jury Member".into()),
        password: Set(hash_password("jury-password").unwrap()),
        role: Set(admin_user::ROLE_JURY.into()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&app.db)
    .await
    .unwrap();

    let res = app
        .post_without_token(
            routes::ADMIN_LOGIN,
            &json!({"email": "jury@hackathon.example", "password": "jury-password"}),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    res.body["token"].as_str().unwrap().to_string()
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn seeded_admin_can_log_in() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::ADMIN_LOGIN,
                &json!({"email": "OPS@hackathon.example", "password": ADMIN_PASSWORD}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["role"], "admin");
        let permissions = res.body["permissions"].as_array().unwrap();
        assert!(permissions.contains(&json!("applicant:manage")));

        let token = res.body["token"].as_str().unwrap();
        let me = app.get_with_token(routes::ADMIN_ME, token).await;
        assert_eq!(me.status, 200);
        assert_eq!(me.body["email"], ADMIN_EMAIL);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::ADMIN_LOGIN,
                &json!({"email": ADMIN_EMAIL, "password": "wrong-password"}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn admin_routes_require_a_valid_jwt() {
        let app = TestApp::spawn().await;

        let missing = app.get_without_token(routes::APPLICANTS).await;
        assert_eq!(missing.status, 401);
        assert_eq!(missing.body["code"], "TOKEN_MISSING");

        let invalid = app.get_with_token(routes::APPLICANTS, "garbage").await;
        assert_eq!(invalid.status, 401);
        assert_eq!(invalid.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn jury_cannot_manage_applicants() {
        let app = TestApp::spawn().await;
        let jury = jury_token(&app).await;

        let res = app.get_with_token(routes::APPLICANTS, &jury).await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn password_reset_goes_through_a_mailed_code() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::PASSWORD_RESET_REQUEST, &json!({"email": ADMIN_EMAIL}))
            .await;
        assert_eq!(res.status, 202);
        let code = app.last_code(ADMIN_EMAIL);

        let res = app
            .post_without_token(
                routes::PASSWORD_RESET_CONFIRM,
                &json!({"email": ADMIN_EMAIL, "code": code, "new_password": "a-brand-new-secret"}),
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        let old = app
            .post_without_token(
                routes::ADMIN_LOGIN,
                &json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}),
            )
            .await;
        assert_eq!(old.status, 401);
        let new = app
            .post_without_token(
                routes::ADMIN_LOGIN,
                &json!({"email": ADMIN_EMAIL, "password": "a-brand-new-secret"}),
            )
            .await;
        assert_eq!(new.status, 200);
    }

    #[tokio::test]
    async fn password_reset_for_unknown_email_looks_accepted() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::PASSWORD_RESET_REQUEST,
                &json!({"email": "stranger@hackathon.example"}),
            )
            .await;

        assert_eq!(res.status, 202);
        assert!(app.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn login_code_cannot_reset_a_password() {
        let app = TestApp::spawn().await;
        app.register("Dual Role", ADMIN_EMAIL, "+919800000001").await;
        app.post_without_token(routes::OTP_REQUEST, &json!({"identifier": ADMIN_EMAIL}))
            .await;
        let login_code = app.last_code(ADMIN_EMAIL);

        let res = app
            .post_without_token(
                routes::PASSWORD_RESET_CONFIRM,
                &json!({"email": ADMIN_EMAIL, "code": login_code, "new_password": "a-brand-new-secret"}),
            )
            .await;

        assert_eq!(res.status, 404);
    }
}

mod applicants {
    use super::*;

    #[tokio::test]
    async fn list_supports_search_status_and_pagination() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        app.register("Asha Rao", "asha@example.edu", "+919800000001").await;
        app.register("Ravi Kumar", "ravi@example.edu", "+919800000002").await;
        let third = app.register("Asha Menon", "menon@example.edu", "+919800000003").await;
        app.post_with_token(
            &routes::select(third["id"].as_str().unwrap()),
            &json!({}),
            &admin,
        )
        .await;

        let all = app
            .get_with_token(&format!("{}?per_page=2", routes::APPLICANTS), &admin)
            .await;
        assert_eq!(all.status, 200);
        assert_eq!(all.body["data"].as_array().unwrap().len(), 2);
        assert_eq!(all.body["pagination"]["total"], 3);
        assert_eq!(all.body["pagination"]["total_pages"], 2);

        let search = app
            .get_with_token(&format!("{}?search=asha", routes::APPLICANTS), &admin)
            .await;
        assert_eq!(search.body["pagination"]["total"], 2);

        let by_status = app
            .get_with_token(&format!("{}?status=selected", routes::APPLICANTS), &admin)
            .await;
        assert_eq!(by_status.body["pagination"]["total"], 1);
        assert_eq!(by_status.body["data"][0]["name"], "Asha Menon");

        let wildcard = app
            .get_with_token(&format!("{}?search=%25", routes::APPLICANTS), &admin)
            .await;
        assert_eq!(wildcard.body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn update_sets_and_clears_the_deadline_override() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.register("Asha Rao", "asha@example.edu", "+919800000001").await["id"]
            .as_str()
            .unwrap()
            .to_string();
        let deadline = Utc::now() + Duration::days(3);

        let set = app
            .patch_with_token(
                &routes::applicant(&id),
                &json!({"submission_deadline": deadline, "submission_enabled": true}),
                &admin,
            )
            .await;
        assert_eq!(set.status, 200, "{}", set.text);
        assert!(set.body["submission_deadline"].is_string());
        assert_eq!(set.body["submission_enabled"], true);

        let untouched = app
            .patch_with_token(&routes::applicant(&id), &json!({"name": "Asha R."}), &admin)
            .await;
        assert!(untouched.body["submission_deadline"].is_string());

        let cleared = app
            .patch_with_token(
                &routes::applicant(&id),
                &json!({"submission_deadline": null}),
                &admin,
            )
            .await;
        assert!(cleared.body["submission_deadline"].is_null());
        assert_eq!(cleared.body["name"], "Asha R.");
    }

    #[tokio::test]
    async fn selection_transitions_are_enforced() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.register("Asha Rao", "asha@example.edu", "+919800000001").await["id"]
            .as_str()
            .unwrap()
            .to_string();

        let rejected = app.post_with_token(&routes::reject(&id), &json!({}), &admin).await;
        assert_eq!(rejected.status, 200);
        assert_eq!(rejected.body["status"], "not_selected");

        let reselected = app.post_with_token(&routes::select(&id), &json!({}), &admin).await;
        assert_eq!(reselected.body["status"], "selected");

        let withdrawn = app.delete_with_token(&routes::applicant(&id), &admin).await;
        assert_eq!(withdrawn.status, 204);

        let after = app.post_with_token(&routes::select(&id), &json!({}), &admin).await;
        assert_eq!(after.status, 409);
        assert_eq!(after.body["code"], "INVALID_TRANSITION");

        let fetched = app.get_with_token(&routes::applicant(&id), &admin).await;
        assert_eq!(fetched.body["status"], "withdrawn");
        assert_eq!(fetched.body["submission_enabled"], false);
    }

    #[tokio::test]
    async fn unknown_applicant_is_not_found() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app
            .get_with_token(&routes::applicant(&uuid::Uuid::new_v4().to_string()), &admin)
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn export_is_a_csv_attachment() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        app.register("Rao, Asha", "asha@example.edu", "+919800000001").await;
        app.register("Ravi Kumar", "ravi@example.edu", "+919800000002").await;

        let res = app.get_with_token(routes::APPLICANTS_EXPORT, &admin).await;

        assert_eq!(res.status, 200);
        assert!(
            res.headers["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/csv")
        );
        assert!(
            res.headers["content-disposition"]
                .to_str()
                .unwrap()
                .starts_with("attachment")
        );
        let lines: Vec<&str> = res.text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("registration_id,name,email"));
        assert!(res.text.contains("\"Rao, Asha\""));
        assert!(res.text.contains("'+919800000001"));
    }

    #[tokio::test]
    async fn dashboard_counts_applicants_and_submissions() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let stage_id = app.create_active_stage(&admin, "Idea round").await;
        let (_, session) = app
            .enrolled_applicant(&admin, "Asha Rao", "asha@example.edu", "+919800000001")
            .await;
        app.register("Ravi Kumar", "ravi@example.edu", "+919800000002").await;
        app.submit(&session, stage_id).await;

        let res = app.get_with_token(routes::DASHBOARD_STATS, &admin).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["total_applicants"], 2);
        assert_eq!(res.body["applicants_by_status"]["registered"], 2);
        assert_eq!(res.body["applicants_by_status"]["withdrawn"], 0);
        let stage = &res.body["stages"][0];
        assert_eq!(stage["id"], stage_id);
        assert_eq!(stage["participants"], 1);
        assert_eq!(stage["submissions_by_status"]["submitted"], 1);
        assert_eq!(stage["submissions_by_status"]["draft"], 0);
    }
}

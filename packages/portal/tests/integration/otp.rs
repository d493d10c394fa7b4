use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

use portal::entity::otp_verification;

use crate::common::{TestApp, routes};

const EMAIL: &str = "asha.rao@example.edu";
const MOBILE: &str = "+919876543210";

async fn request_code(app: &TestApp, identifier: &str) -> String {
    let res = app
        .post_without_token(routes::OTP_REQUEST, &json!({"identifier": identifier}))
        .await;
    assert_eq!(res.status, 202, "OTP request failed: {}", res.text);
    app.last_code(identifier)
}

async fn verify(app: &TestApp, identifier: &str, code: &str) -> crate::common::TestResponse {
    app.post_without_token(
        routes::OTP_VERIFY,
        &json!({"identifier": identifier, "code": code}),
    )
    .await
}

mod request {
    use super::*;

    #[tokio::test]
    async fn registered_email_receives_a_code_by_mail() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;

        let res = app
            .post_without_token(routes::OTP_REQUEST, &json!({"identifier": "  Asha.Rao@Example.edu "}))
            .await;

        assert_eq!(res.status, 202);
        assert_eq!(res.body["identifier"], EMAIL);
        assert_eq!(res.body["purpose"], "login");
        assert_eq!(res.body["delivered"], true);

        let sent = app.notifier.sent_to(EMAIL);
        let otp = sent.last().unwrap();
        assert_eq!(otp.channel.as_str(), "mail");
        let code = otp.redact.clone().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn registered_mobile_receives_a_code_by_sms() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;

        let res = app
            .post_without_token(routes::OTP_REQUEST, &json!({"identifier": "+91 98765-43210"}))
            .await;

        assert_eq!(res.status, 202, "{}", res.text);
        assert_eq!(res.body["identifier"], MOBILE);
        assert_eq!(app.notifier.sent_to(MOBILE).last().unwrap().channel.as_str(), "sms");
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::OTP_REQUEST, &json!({"identifier": "nobody@example.edu"}))
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
        assert!(app.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn blank_identifier_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::OTP_REQUEST, &json!({"identifier": "   "}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["field"], "identifier");
    }

    #[tokio::test]
    async fn public_endpoint_only_serves_login_codes() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;

        let res = app
            .post_without_token(
                routes::OTP_REQUEST,
                &json!({"identifier": EMAIL, "purpose": "password_reset"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(res.body["field"], "purpose");
    }

    #[tokio::test]
    async fn requests_inside_the_minimum_interval_are_rate_limited() {
        let app = TestApp::spawn_with(|c| c.otp.min_interval_secs = 60).await;
        app.register("Asha Rao", EMAIL, MOBILE).await;

        request_code(&app, EMAIL).await;
        let res = app
            .post_without_token(routes::OTP_REQUEST, &json!({"identifier": EMAIL}))
            .await;

        assert_eq!(res.status, 429);
        assert_eq!(res.body["code"], "RATE_LIMITED");
        let retry_after: u64 = res.headers["retry-after"].to_str().unwrap().parse().unwrap();
        assert!(retry_after > 0 && retry_after <= 60);
    }

    #[tokio::test]
    async fn hourly_cap_is_enforced() {
        let app = TestApp::spawn_with(|c| c.otp.max_per_hour = 2).await;
        app.register("Asha Rao", EMAIL, MOBILE).await;

        request_code(&app, EMAIL).await;
        request_code(&app, EMAIL).await;
        let res = app
            .post_without_token(routes::OTP_REQUEST, &json!({"identifier": EMAIL}))
            .await;

        assert_eq!(res.status, 429);
        assert_eq!(res.body["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn gateway_failure_still_issues_the_code() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        app.notifier.fail_from_now();

        let res = app
            .post_without_token(routes::OTP_REQUEST, &json!({"identifier": EMAIL}))
            .await;

        assert_eq!(res.status, 202);
        assert_eq!(res.body["delivered"], false);
    }
}

mod verification {
    use super::*;

    #[tokio::test]
    async fn correct_code_opens_a_session() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        let code = request_code(&app, EMAIL).await;

        let res = verify(&app, EMAIL, &code).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["applicant"]["email"], EMAIL);
        let token = res.body["session_token"].as_str().unwrap();
        assert!(token.len() >= 32);
        let cookie = res.headers["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with("portal_session="));
        assert!(cookie.contains("HttpOnly"));

        let me = app.get_with_token(routes::APPLICANT_ME, token).await;
        assert_eq!(me.status, 200);
        assert_eq!(me.body["applicant"]["email"], EMAIL);
    }

    #[tokio::test]
    async fn a_code_verifies_only_once() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        let code = request_code(&app, EMAIL).await;

        assert_eq!(verify(&app, EMAIL, &code).await.status, 200);
        let again = verify(&app, EMAIL, &code).await;

        assert_eq!(again.status, 404);
        assert_eq!(again.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn concurrent_verifications_consume_the_code_once() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        let code = request_code(&app, EMAIL).await;

        let (first, second) = tokio::join!(verify(&app, EMAIL, &code), verify(&app, EMAIL, &code));

        let mut statuses = [first.status, second.status];
        statuses.sort();
        assert_eq!(statuses, [200, 404], "{} / {}", first.text, second.text);
        let loser = if first.status == 404 { &first } else { &second };
        assert_eq!(loser.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn wrong_code_reports_remaining_attempts() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        let code = request_code(&app, EMAIL).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let res = verify(&app, EMAIL, wrong).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "OTP_MISMATCH");
        assert!(res.text.contains("4 attempt(s) remaining"));
    }

    #[tokio::test]
    async fn code_locks_after_max_attempts() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        let code = request_code(&app, EMAIL).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..5 {
            assert_eq!(verify(&app, EMAIL, wrong).await.body["code"], "OTP_MISMATCH");
        }
        let locked = verify(&app, EMAIL, &code).await;

        assert_eq!(locked.status, 429);
        assert_eq!(locked.body["code"], "ATTEMPTS_EXCEEDED");
    }

    #[tokio::test]
    async fn expired_code_is_refused() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        let code = request_code(&app, EMAIL).await;

        otp_verification::Entity::update_many()
            .col_expr(
                otp_verification::Column::ExpiresAt,
                Expr::value(Utc::now() - Duration::minutes(1)),
            )
            .filter(otp_verification::Column::Identifier.eq(EMAIL))
            .exec(&app.db)
            .await
            .unwrap();

        let res = verify(&app, EMAIL, &code).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "OTP_EXPIRED");
    }

    #[tokio::test]
    async fn a_new_code_supersedes_the_previous_one() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        let first = request_code(&app, EMAIL).await;
        let second = request_code(&app, EMAIL).await;

        if first != second {
            assert_eq!(verify(&app, EMAIL, &first).await.body["code"], "OTP_MISMATCH");
        }
        assert_eq!(verify(&app, EMAIL, &second).await.status, 200);

        let live = otp_verification::Entity::find()
            .filter(otp_verification::Column::Identifier.eq(EMAIL))
            .filter(otp_verification::Column::Verified.eq(false))
            .filter(otp_verification::Column::ExpiresAt.gt(Utc::now()))
            .all(&app.db)
            .await
            .unwrap();
        assert!(live.is_empty());
    }

    #[tokio::test]
    async fn verifying_without_a_request_is_not_found() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;

        let res = verify(&app, EMAIL, "123456").await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn codes_never_reach_the_notification_log() {
        let app = TestApp::spawn().await;
        app.register("Asha Rao", EMAIL, MOBILE).await;
        let code = request_code(&app, EMAIL).await;
        let admin = app.admin_token().await;

        let res = app.get_with_token(routes::NOTIFICATIONS, &admin).await;

        assert_eq!(res.status, 200);
        assert!(!res.text.contains(&code));
        assert!(res.text.contains("******"));
    }
}

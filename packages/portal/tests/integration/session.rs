use chrono::{Duration, Utc};
use reqwest::Client;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde_json::json;

use ::common::SessionConfig;
use portal::entity::{applicant_session, otp_verification};
use portal::session::SessionService;

use crate::common::{TestApp, routes};

const EMAIL: &str = "ravi.kumar@example.edu";
const MOBILE: &str = "+919812345678";

#[tokio::test]
async fn missing_token_is_rejected() {
    let app = TestApp::spawn().await;

    let res = app.get_without_token(routes::APPLICANT_ME).await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");
}

#[tokio::test]
async fn unknown_token_is_not_a_session() {
    let app = TestApp::spawn().await;

    let res = app.get_with_token(routes::APPLICANT_ME, "not-a-session").await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn admin_jwt_is_not_an_applicant_session() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let res = app.get_with_token(routes::APPLICANT_ME, &admin).await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn expired_session_is_refused_and_removed() {
    let app = TestApp::spawn().await;
    app.register("Ravi Kumar", EMAIL, MOBILE).await;
    let token = app.sign_in(EMAIL).await;

    applicant_session::Entity::update_many()
        .col_expr(
            applicant_session::Column::ExpiresAt,
            Expr::value(Utc::now() - Duration::seconds(1)),
        )
        .exec(&app.db)
        .await
        .unwrap();

    let res = app.get_with_token(routes::APPLICANT_ME, &token).await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "SESSION_EXPIRED");

    let again = app.get_with_token(routes::APPLICANT_ME, &token).await;
    assert_eq!(again.body["code"], "SESSION_NOT_FOUND");
    assert_eq!(applicant_session::Entity::find().count(&app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn validation_does_not_extend_the_expiry() {
    let app = TestApp::spawn().await;
    app.register("Ravi Kumar", EMAIL, MOBILE).await;
    let token = app.sign_in(EMAIL).await;

    let before = applicant_session::Entity::find().one(&app.db).await.unwrap().unwrap();
    app.get_with_token(routes::APPLICANT_ME, &token).await;
    let after = applicant_session::Entity::find().one(&app.db).await.unwrap().unwrap();

    assert_eq!(before.expires_at, after.expires_at);
    assert!(after.last_activity >= before.last_activity);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::spawn().await;
    app.register("Ravi Kumar", EMAIL, MOBILE).await;
    let token = app.sign_in(EMAIL).await;

    let res = app
        .post_with_token(routes::APPLICANT_LOGOUT, &json!({}), &token)
        .await;
    assert_eq!(res.status, 204);

    let me = app.get_with_token(routes::APPLICANT_ME, &token).await;
    assert_eq!(me.status, 401);
    assert_eq!(me.body["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn session_cookie_authenticates_without_a_header() {
    let app = TestApp::spawn().await;
    app.register("Ravi Kumar", EMAIL, MOBILE).await;
    app.post_without_token(routes::OTP_REQUEST, &json!({"identifier": EMAIL}))
        .await;
    let code = app.last_code(EMAIL);

    let browser = Client::builder().cookie_store(true).build().unwrap();
    let res = browser
        .post(app.url(routes::OTP_VERIFY))
        .json(&json!({"identifier": EMAIL, "code": code}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let me = browser.get(app.url(routes::APPLICANT_ME)).send().await.unwrap();
    assert_eq!(me.status(), 200);
}

#[tokio::test]
async fn withdrawal_ends_every_session() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let registered = app.register("Ravi Kumar", EMAIL, MOBILE).await;
    let id = registered["id"].as_str().unwrap();
    let first = app.sign_in(EMAIL).await;
    let second = app.sign_in(MOBILE).await;

    let res = app.delete_with_token(&routes::applicant(id), &admin).await;
    assert_eq!(res.status, 204);

    for token in [first, second] {
        let me = app.get_with_token(routes::APPLICANT_ME, &token).await;
        assert_eq!(me.status, 401);
    }
    let otp = app
        .post_without_token(routes::OTP_REQUEST, &json!({"identifier": EMAIL}))
        .await;
    assert_eq!(otp.status, 404);
}

#[tokio::test]
async fn purge_removes_expired_sessions_and_stale_codes() {
    let app = TestApp::spawn().await;
    app.register("Ravi Kumar", EMAIL, MOBILE).await;
    let live = app.sign_in(EMAIL).await;
    app.sign_in(MOBILE).await;

    // Expire every session but the first, and age the verified codes
    let keep = applicant_session::Entity::find()
        .order_by_asc(applicant_session::Column::Id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    applicant_session::Entity::update_many()
        .col_expr(
            applicant_session::Column::ExpiresAt,
            Expr::value(Utc::now() - Duration::hours(1)),
        )
        .filter(applicant_session::Column::Id.ne(keep.id))
        .exec(&app.db)
        .await
        .unwrap();
    otp_verification::Entity::update_many()
        .col_expr(
            otp_verification::Column::ExpiresAt,
            Expr::value(Utc::now() - Duration::days(2)),
        )
        .exec(&app.db)
        .await
        .unwrap();

    let config = SessionConfig::default();
    let stats = SessionService::new(&app.db, &config)
        .purge_expired(Utc::now())
        .await
        .unwrap();

    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.otps, 2);
    assert_eq!(app.get_with_token(routes::APPLICANT_ME, &live).await.status, 200);
}

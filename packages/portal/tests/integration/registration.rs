use serde_json::json;

use crate::common::{TestApp, registration_body, routes};

const EMAIL: &str = "meera.nair@example.edu";
const MOBILE: &str = "+919900112233";

#[tokio::test]
async fn applicant_can_register_and_is_mailed() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(routes::REGISTER, &registration_body("Meera Nair", EMAIL, MOBILE))
        .await;

    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["status"], "registered");
    assert_eq!(res.body["email"], EMAIL);
    let registration_id = res.body["registration_id"].as_str().unwrap();
    assert!(registration_id.starts_with("HX-"));
    assert_eq!(registration_id.len(), 11);

    let mail = app.notifier.sent_to(EMAIL);
    assert_eq!(mail.len(), 1);
    assert!(mail[0].body.contains(registration_id));
}

#[tokio::test]
async fn contact_details_are_normalized() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(
            routes::REGISTER,
            &registration_body("Meera Nair", " Meera.Nair@Example.EDU ", "+91 99001-12233"),
        )
        .await;

    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["email"], EMAIL);
    let token = app.sign_in(MOBILE).await;
    let me = app.get_with_token(routes::APPLICANT_ME, &token).await;
    assert_eq!(me.body["applicant"]["mobile"], MOBILE);
}

#[tokio::test]
async fn duplicate_mobile_names_the_field() {
    let app = TestApp::spawn().await;
    app.register("Meera Nair", EMAIL, MOBILE).await;

    let res = app
        .post_without_token(
            routes::REGISTER,
            &registration_body("Someone Else", "someone@example.edu", MOBILE),
        )
        .await;

    assert_eq!(res.status, 409);
    assert_eq!(res.body["code"], "DUPLICATE");
    assert_eq!(res.body["field"], "mobile");
}

#[tokio::test]
async fn duplicate_email_is_case_insensitive() {
    let app = TestApp::spawn().await;
    app.register("Meera Nair", EMAIL, MOBILE).await;

    let res = app
        .post_without_token(
            routes::REGISTER,
            &registration_body("Someone Else", "MEERA.NAIR@example.edu", "+919911223344"),
        )
        .await;

    assert_eq!(res.status, 409);
    assert_eq!(res.body["field"], "email");
}

#[tokio::test]
async fn every_invalid_field_is_reported_at_once() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(
            routes::REGISTER,
            &json!({
                "name": "",
                "email": "not-an-email",
                "mobile": "123",
                "student_id": "S-1",
                "course": "CS",
                "year_of_graduation": 1950,
                "college_name": "College",
                "linkedin_profile": "https://example.com/me",
            }),
        )
        .await;

    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
    let fields = res.body["fields"].as_object().unwrap();
    for field in ["name", "email", "mobile", "year_of_graduation", "linkedin_profile"] {
        assert!(fields.contains_key(field), "missing {field}: {}", res.text);
    }
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::spawn().await;

    let res = app
        .client
        .post(app.url(routes::REGISTER))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

mod confirmation {
    use super::*;

    fn confirmation_code(app: &TestApp) -> String {
        app.notifier
            .sent_to(EMAIL)
            .iter()
            .rev()
            .flat_map(|n| n.body.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .find(|word| word.starts_with("CF-"))
            .expect("No confirmation code was mailed")
    }

    #[tokio::test]
    async fn selected_applicant_confirms_with_the_mailed_code() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.register("Meera Nair", EMAIL, MOBILE).await["id"]
            .as_str()
            .unwrap()
            .to_string();

        let selected = app.post_with_token(&routes::select(&id), &json!({}), &admin).await;
        assert_eq!(selected.status, 200, "{}", selected.text);
        assert_eq!(selected.body["status"], "selected");
        assert_eq!(selected.body["submission_enabled"], true);
        assert!(selected.body.get("confirmation_token").is_none());

        let code = confirmation_code(&app);
        let log = app.get_with_token(routes::NOTIFICATIONS, &admin).await;
        assert_eq!(log.body["data"][0]["subject"], "You have been selected");
        assert!(!log.text.contains(&code));

        let res = app
            .post_without_token(routes::CONFIRM_BY_CODE, &json!({"code": code}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "confirmed");
        assert!(res.body["confirmed_at"].is_string());

        let again = app
            .post_without_token(routes::CONFIRM_BY_CODE, &json!({"code": code}))
            .await;
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn signed_in_applicant_confirms_from_the_dashboard() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.register("Meera Nair", EMAIL, MOBILE).await["id"]
            .as_str()
            .unwrap()
            .to_string();
        let session = app.sign_in(EMAIL).await;

        let early = app
            .post_with_token(routes::APPLICANT_CONFIRM, &json!({}), &session)
            .await;
        assert_eq!(early.status, 409);
        assert_eq!(early.body["code"], "INVALID_TRANSITION");

        app.post_with_token(&routes::select(&id), &json!({}), &admin).await;
        let res = app
            .post_with_token(routes::APPLICANT_CONFIRM, &json!({}), &session)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "confirmed");
    }
}

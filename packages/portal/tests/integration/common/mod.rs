use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, Duration, Utc};
use reqwest::Client;
use sea_orm::{ConnectOptions, DatabaseConnection};
use serde_json::{Value, json};

use ::common::{OtpConfig, RetryConfig, SessionConfig, SweeperConfig};
use portal::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, NotificationConfig, ServerConfig,
};
use portal::notification::{Notification, Notifier, NotifyError};
use portal::state::AppState;

pub const ADMIN_EMAIL: &str = "ops@hackathon.example";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

pub mod routes {
    pub const REGISTER: &str = "/api/v1/register";
    pub const OTP_REQUEST: &str = "/api/v1/otp/request";
    pub const OTP_VERIFY: &str = "/api/v1/otp/verify";
    pub const CONFIRM_BY_CODE: &str = "/api/v1/confirm-participation";
    pub const STAGES: &str = "/api/v1/stages";

    pub const APPLICANT_ME: &str = "/api/v1/applicant/me";
    pub const APPLICANT_LOGOUT: &str = "/api/v1/applicant/logout";
    pub const APPLICANT_CONFIRM: &str = "/api/v1/applicant/confirm-participation";
    pub const APPLICANT_SUBMISSIONS: &str = "/api/v1/applicant/submissions";

    pub fn submission(stage_id: i32) -> String {
        format!("/api/v1/applicant/submissions/{stage_id}")
    }

    pub fn reopen(stage_id: i32) -> String {
        format!("/api/v1/applicant/submissions/{stage_id}/reopen")
    }

    pub const ADMIN_LOGIN: &str = "/api/v1/admin/auth/login";
    pub const ADMIN_ME: &str = "/api/v1/admin/auth/me";
    pub const PASSWORD_RESET_REQUEST: &str = "/api/v1/admin/auth/password-reset/request";
    pub const PASSWORD_RESET_CONFIRM: &str = "/api/v1/admin/auth/password-reset/confirm";

    pub const APPLICANTS: &str = "/api/v1/admin/applicants";
    pub const APPLICANTS_EXPORT: &str = "/api/v1/admin/applicants/export";
    pub const DASHBOARD_STATS: &str = "/api/v1/admin/dashboard/stats";

    pub fn applicant(id: &str) -> String {
        format!("/api/v1/admin/applicants/{id}")
    }

    pub fn select(id: &str) -> String {
        format!("/api/v1/admin/applicants/{id}/select")
    }

    pub fn reject(id: &str) -> String {
        format!("/api/v1/admin/applicants/{id}/reject")
    }

    pub const ADMIN_STAGES: &str = "/api/v1/admin/stages";

    pub fn stage(id: i32) -> String {
        format!("/api/v1/admin/stages/{id}")
    }

    pub fn stage_status(id: i32) -> String {
        format!("/api/v1/admin/stages/{id}/status")
    }

    pub fn stage_submissions(id: i32) -> String {
        format!("/api/v1/admin/stages/{id}/submissions")
    }

    pub fn start_review(submission_id: i32) -> String {
        format!("/api/v1/admin/submissions/{submission_id}/review")
    }

    pub fn decision(submission_id: i32) -> String {
        format!("/api/v1/admin/submissions/{submission_id}/decision")
    }

    pub const BULK_DECISIONS: &str = "/api/v1/admin/submissions/bulk-decisions";
    pub const NOTIFICATIONS: &str = "/api/v1/admin/notifications";
}

/// Captures every message instead of delivering it.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<bool>>,
    stall: Arc<Mutex<Option<std::time::Duration>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<Notification> {
        self.sent().into_iter().filter(|n| n.to == recipient).collect()
    }

    /// Make every following send fail like a gateway outage.
    pub fn fail_from_now(&self) {
        *self.failing.lock().unwrap() = true;
    }

    /// Make every following send hang for `delay` like an unresponsive gateway.
    pub fn stall_from_now(&self, delay: std::time::Duration) {
        *self.stall.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        let stall = *self.stall.lock().unwrap();
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        if *self.failing.lock().unwrap() {
            return Err(NotifyError::Transport("gateway down".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
    pub headers: reqwest::header::HeaderMap,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            text,
            body,
            headers,
        }
    }
}

/// A running test server over a private in-memory database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub notifier: RecordingNotifier,
}

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors: CorsConfig {
                allow_origins: vec![],
                max_age: 3600,
            },
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 5,
        },
        auth: AuthConfig {
            jwt_secret: "test-secret-for-integration-tests".to_string(),
            jwt_ttl_hours: 1,
            bootstrap_admin_email: Some(ADMIN_EMAIL.to_string()),
            bootstrap_admin_password: Some(ADMIN_PASSWORD.to_string()),
        },
        otp: OtpConfig {
            min_interval_secs: 0,
            ..Default::default()
        },
        session: SessionConfig::default(),
        notification: NotificationConfig::default(),
        retry: RetryConfig {
            max_attempts: 1,
            ..Default::default()
        },
        sweeper: SweeperConfig {
            enabled: false,
            ..Default::default()
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = test_config();
        configure(&mut config);

        // One connection: every pooled connection would get its own in-memory database
        let mut opts = ConnectOptions::new(config.database.url.clone());
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = portal::database::connect_with(opts)
            .await
            .expect("Failed to prepare test database");
        portal::seed::seed_bootstrap_admin(&db, &config.auth)
            .await
            .expect("Failed to seed admin");

        let notifier = RecordingNotifier::default();
        let state = AppState::new(db.clone(), config, Arc::new(notifier.clone()));
        let app = portal::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            notifier,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn patch_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PATCH request");

        TestResponse::from_response(res).await
    }

    pub async fn put_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// Log in as the seeded admin and return the JWT.
    pub async fn admin_token(&self) -> String {
        let res = self
            .post_without_token(
                routes::ADMIN_LOGIN,
                &json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 200, "Admin login failed: {}", res.text);
        res.body["token"].as_str().unwrap().to_string()
    }

    /// Register an applicant and return the response body.
    pub async fn register(&self, name: &str, email: &str, mobile: &str) -> Value {
        let res = self
            .post_without_token(routes::REGISTER, &registration_body(name, email, mobile))
            .await;
        assert_eq!(res.status, 201, "Registration failed: {}", res.text);
        res.body
    }

    /// The code carried by the latest OTP message sent to `recipient`.
    pub fn last_code(&self, recipient: &str) -> String {
        self.notifier
            .sent_to(recipient)
            .into_iter()
            .rev()
            .find_map(|n| n.redact)
            .unwrap_or_else(|| panic!("No code was sent to {recipient}"))
    }

    /// Request and verify a login code, returning the session token.
    pub async fn sign_in(&self, identifier: &str) -> String {
        let res = self
            .post_without_token(routes::OTP_REQUEST, &json!({"identifier": identifier}))
            .await;
        assert_eq!(res.status, 202, "OTP request failed: {}", res.text);

        let code = self.last_code(identifier);
        let res = self
            .post_without_token(
                routes::OTP_VERIFY,
                &json!({"identifier": identifier, "code": code}),
            )
            .await;
        assert_eq!(res.status, 200, "OTP verify failed: {}", res.text);
        res.body["session_token"].as_str().unwrap().to_string()
    }

    /// Create a stage whose window contains now and open it.
    pub async fn create_active_stage(&self, admin: &str, name: &str) -> i32 {
        let now = Utc::now();
        let res = self
            .post_with_token(
                routes::ADMIN_STAGES,
                &json!({
                    "name": name,
                    "start_time": now - Duration::hours(1),
                    "end_time": now + Duration::days(2),
                }),
                admin,
            )
            .await;
        assert_eq!(res.status, 201, "Stage creation failed: {}", res.text);
        let id = res.body["id"].as_i64().unwrap() as i32;

        let res = self
            .post_with_token(&routes::stage_status(id), &json!({"status": "active"}), admin)
            .await;
        assert_eq!(res.status, 200, "Stage activation failed: {}", res.text);
        id
    }

    /// Register, enable submissions and sign in. Returns `(applicant_id, session_token)`.
    pub async fn enrolled_applicant(
        &self,
        admin: &str,
        name: &str,
        email: &str,
        mobile: &str,
    ) -> (String, String) {
        let registered = self.register(name, email, mobile).await;
        let id = registered["id"].as_str().unwrap().to_string();

        let res = self
            .patch_with_token(
                &routes::applicant(&id),
                &json!({"submission_enabled": true}),
                admin,
            )
            .await;
        assert_eq!(res.status, 200, "Enabling submissions failed: {}", res.text);

        let token = self.sign_in(email).await;
        (id, token)
    }

    /// Submit a GitHub link for a stage and return the submission ID.
    pub async fn submit(&self, session: &str, stage_id: i32) -> i32 {
        let res = self
            .post_with_token(
                &routes::submission(stage_id),
                &json!({"github_url": "https://github.com/team/entry"}),
                session,
            )
            .await;
        assert_eq!(res.status, 200, "Submit failed: {}", res.text);
        res.body["id"].as_i64().unwrap() as i32
    }
}

pub fn registration_body(name: &str, email: &str, mobile: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "mobile": mobile,
        "student_id": "S-1024",
        "course": "Computer Science",
        "year_of_graduation": Utc::now().year() + 1,
        "college_name": "City Engineering College",
    })
}

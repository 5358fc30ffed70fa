//! HTTP tests against the full router on a real TCP listener

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Duration;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tryout_auth::clock::ManualClock;
use tryout_auth::config::{Config, HttpConfig, NodeConfig, SessionConfig, TokenConfig};
use tryout_auth::storage::Database;
use tryout_auth::tokens::{Passwords, SigningKey};
use tryout_auth::{api, AppState};

struct TestApp {
    addr: SocketAddr,
    client: reqwest::Client,
    clock: Arc<ManualClock>,
    state: Arc<AppState>,
    _temp: TempDir,
}

/// Cookies handed out by a response, by name
type Jar = HashMap<String, String>;

async fn spawn_app() -> TestApp {
    let temp = TempDir::new().unwrap();
    let db = Database::open(temp.path()).unwrap();
    let clock = Arc::new(ManualClock::default());
    let config = Config {
        http: HttpConfig::default(),
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: temp.path().display().to_string(),
        },
        sessions: SessionConfig::default(),
        test_mode: false,
        tokens: TokenConfig::new(SigningKey::new("api-test-secret-key-long-enough-for-hs256")),
    };
    let state = Arc::new(AppState::new(
        config,
        db,
        clock.clone(),
        Passwords::with_cost(1024, 1, 1).unwrap(),
    ));

    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr,
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
        clock,
        state,
        _temp: temp,
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        jar: Option<&Jar>,
        body: Option<Value>,
    ) -> (StatusCode, Jar, Vec<String>, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(jar) = jar {
            let header = jar
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(COOKIE, header);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.unwrap();
        let status = response.status();
        let raw_cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let cookies = raw_cookies
            .iter()
            .filter_map(|c| {
                let pair = c.split(';').next()?;
                let (name, value) = pair.split_once('=')?;
                Some((name.to_string(), value.to_string()))
            })
            .collect();
        let text = response.text().await.unwrap();
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, cookies, raw_cookies, body)
    }

    async fn get(&self, path: &str, jar: Option<&Jar>) -> (StatusCode, Value) {
        let (status, _, _, body) = self.send(reqwest::Method::GET, path, jar, None).await;
        (status, body)
    }

    async fn register(&self, email: &str, password: &str) -> String {
        let (status, _, _, body) = self
            .send(
                reqwest::Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Tryout Student", "email": email, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn login(&self, email: &str, password: &str) -> Jar {
        let (status, jar, _, body) = self
            .send(
                reqwest::Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": email, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        jar
    }

    async fn make_admin(&self, email: &str, password: &str) -> Jar {
        let id = self.register(email, password).await;
        self.state.sessions.update_user(&id, "admin", false).unwrap();
        self.login(email, password).await
    }
}

fn assert_fail(status: StatusCode, body: &Value, expected: StatusCode, reason: &str) {
    assert_eq!(status, expected, "{body}");
    assert_eq!(body["status"], "fail");
    assert_eq!(body["data"]["reason"], reason);
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_register_login_me() {
    let app = spawn_app().await;
    let id = app.register("A@X.com", "secret1").await;

    let (status, jar, raw, body) = app
        .send(
            reqwest::Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "a@x.com", "password": "secret1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let access_cookie = raw.iter().find(|c| c.starts_with("access_token=")).unwrap();
    let refresh_cookie = raw.iter().find(|c| c.starts_with("refresh_token=")).unwrap();
    for cookie in [access_cookie, refresh_cookie] {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
    }
    assert!(access_cookie.contains("Max-Age=900"));
    assert!(refresh_cookie.contains("Max-Age=604800"));

    // Tokens travel only in cookies
    let text = body.to_string();
    assert!(!text.contains(&jar["access_token"]));
    assert!(!text.contains(&jar["refresh_token"]));

    let (status, body) = app.get("/api/auth/me", Some(&jar)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);
    assert_eq!(body["data"]["email"], "a@x.com");
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["premium_active"], false);
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let app = spawn_app().await;
    app.register("a@x.com", "secret1").await;

    for (email, password) in [("a@x.com", "wrong"), ("nobody@x.com", "secret1")] {
        let (status, jar, _, body) = app
            .send(
                reqwest::Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": email, "password": password})),
            )
            .await;
        assert_fail(status, &body, StatusCode::UNAUTHORIZED, "invalid_credentials");
        assert!(jar.is_empty());
    }
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let app = spawn_app().await;
    app.register("a@x.com", "secret1").await;

    let (status, _, _, body) = app
        .send(
            reqwest::Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Other", "email": "a@x.com", "password": "secret1"})),
        )
        .await;
    assert_fail(status, &body, StatusCode::CONFLICT, "email_taken");

    let (status, _, _, body) = app
        .send(
            reqwest::Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Other", "email": "b@x.com", "password": "123"})),
        )
        .await;
    assert_fail(status, &body, StatusCode::BAD_REQUEST, "invalid_format");

    let (status, _, _, body) = app
        .send(
            reqwest::Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "b@x.com"})),
        )
        .await;
    assert_fail(status, &body, StatusCode::BAD_REQUEST, "invalid_format");
}

#[tokio::test]
async fn test_me_requires_access_cookie() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api/auth/me", None).await;
    assert_fail(status, &body, StatusCode::UNAUTHORIZED, "unauthenticated");

    let jar = Jar::from([("access_token".to_string(), "not.a.token".to_string())]);
    let (status, body) = app.get("/api/auth/me", Some(&jar)).await;
    assert_fail(status, &body, StatusCode::UNAUTHORIZED, "unauthenticated");
}

#[tokio::test]
async fn test_second_login_revokes_first_refresh() {
    let app = spawn_app().await;
    app.register("a@x.com", "secret1").await;

    let first = app.login("a@x.com", "secret1").await;
    let second = app.login("a@x.com", "secret1").await;

    let (status, _, _, body) = app
        .send(reqwest::Method::POST, "/api/auth/refresh-token", Some(&first), None)
        .await;
    assert_fail(status, &body, StatusCode::UNAUTHORIZED, "revoked");

    let (status, jar, _, _) = app
        .send(reqwest::Method::POST, "/api/auth/refresh-token", Some(&second), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(jar.contains_key("access_token"));
    assert!(!jar.contains_key("refresh_token"));
}

#[tokio::test]
async fn test_access_expiry_then_refresh() {
    let app = spawn_app().await;
    app.register("a@x.com", "secret1").await;
    let mut jar = app.login("a@x.com", "secret1").await;

    app.clock.advance(Duration::minutes(15));
    let (status, body) = app.get("/api/auth/me", Some(&jar)).await;
    assert_fail(status, &body, StatusCode::UNAUTHORIZED, "unauthenticated");

    let (status, refreshed, _, _) = app
        .send(reqwest::Method::POST, "/api/auth/refresh-token", Some(&jar), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    jar.extend(refreshed);

    let (status, _) = app.get("/api/auth/me", Some(&jar)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_and_clears_cookies() {
    let app = spawn_app().await;
    app.register("a@x.com", "secret1").await;
    let jar = app.login("a@x.com", "secret1").await;

    let (status, _, raw, _) = app
        .send(reqwest::Method::POST, "/api/auth/logout", Some(&jar), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(raw.len(), 2);
    assert!(raw.iter().all(|c| c.contains("Max-Age=0")));

    let (status, _, _, body) = app
        .send(reqwest::Method::POST, "/api/auth/refresh-token", Some(&jar), None)
        .await;
    assert_fail(status, &body, StatusCode::UNAUTHORIZED, "revoked");

    // Anonymous logout still succeeds
    let (status, _, raw, body) = app
        .send(reqwest::Method::POST, "/api/auth/logout", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(raw.len(), 2);
}

#[tokio::test]
async fn test_admin_gate() {
    let app = spawn_app().await;
    app.register("a@x.com", "secret1").await;
    let user = app.login("a@x.com", "secret1").await;
    let admin = app.make_admin("admin@x.com", "secret1").await;

    let (status, body) = app.get("/api/auth/users", Some(&user)).await;
    assert_fail(status, &body, StatusCode::FORBIDDEN, "forbidden");

    let (status, body) = app.get("/api/auth/users", None).await;
    assert_fail(status, &body, StatusCode::UNAUTHORIZED, "unauthenticated");

    let (status, body) = app.get("/api/auth/users", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = app.get("/api/orders", Some(&user)).await;
    assert_fail(status, &body, StatusCode::FORBIDDEN, "forbidden");
    let (status, _) = app.get("/api/orders", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_order_verification_grants_premium() {
    let app = spawn_app().await;
    let user_id = app.register("a@x.com", "secret1").await;
    let user = app.login("a@x.com", "secret1").await;
    app.register("b@x.com", "secret1").await;
    let stranger = app.login("b@x.com", "secret1").await;
    let admin = app.make_admin("admin@x.com", "secret1").await;

    let (status, _, _, body) = app
        .send(
            reqwest::Method::POST,
            "/api/orders",
            Some(&user),
            Some(json!({
                "item_type": "premium_monthly",
                "item_id": uuid::Uuid::new_v4().to_string(),
                "amount": 49000.0
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "pending");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let proof = json!({"url": "https://cdn.example.com/proof.png"});
    let path = format!("/api/orders/{order_id}/payment-proof");
    let (status, _, _, body) = app
        .send(reqwest::Method::PUT, &path, Some(&stranger), Some(proof.clone()))
        .await;
    assert_fail(status, &body, StatusCode::FORBIDDEN, "forbidden");
    let (status, _, _, body) = app
        .send(reqwest::Method::PUT, &path, Some(&user), Some(proof))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_proof_url"], "https://cdn.example.com/proof.png");

    let orders_path = format!("/api/orders/user/{user_id}");
    let (status, body) = app.get(&orders_path, Some(&stranger)).await;
    assert_fail(status, &body, StatusCode::FORBIDDEN, "forbidden");
    let (status, body) = app.get(&orders_path, Some(&user)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let verify_path = format!("/api/orders/{order_id}/verify");
    let (status, _, _, body) = app
        .send(reqwest::Method::PUT, &verify_path, Some(&user), None)
        .await;
    assert_fail(status, &body, StatusCode::FORBIDDEN, "forbidden");
    let (status, _, _, body) = app
        .send(reqwest::Method::PUT, &verify_path, Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["order"]["status"], "completed");

    let (_, body) = app.get("/api/auth/me", Some(&user)).await;
    assert_eq!(body["data"]["is_premium"], true);
    assert_eq!(body["data"]["premium_active"], true);

    let missing = format!("/api/orders/{}/verify", uuid::Uuid::new_v4());
    let (status, _, _, body) = app
        .send(reqwest::Method::PUT, &missing, Some(&admin), None)
        .await;
    assert_fail(status, &body, StatusCode::NOT_FOUND, "not_found");
}

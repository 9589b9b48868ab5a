//! Router test helpers backed by the in-memory store.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use db::{
    memory::MemoryStore,
    models::user::{NewUser, User},
    UserStore,
};
use http_body_util::BodyExt;
use http_server::{build_router, password::hash_password, AppConfig, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

/// A registered account with its credentials.
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
    pub api_key: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_signing_key(None)
    }

    pub fn with_signing_key(signing_key: Option<&str>) -> Self {
        let mut config = AppConfig::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://unused".to_string()),
            "JWT_SECRET" => Some("test-secret".to_string()),
            _ => None,
        })
        .expect("test config");
        config.mailgun_signing_key = signing_key.map(str::to_string);

        let store = Arc::new(MemoryStore::new());
        let router = build_router(AppState::new(store.clone(), config));
        Self { router, store }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.send(request(Method::GET, uri, headers, Body::empty())).await
    }

    pub async fn post_json(&self, uri: &str, body: Value, headers: &[(&str, &str)]) -> TestResponse {
        self.send(json_request(Method::POST, uri, body, headers)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value, headers: &[(&str, &str)]) -> TestResponse {
        self.send(json_request(Method::PUT, uri, body, headers)).await
    }

    pub async fn delete_json(
        &self,
        uri: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.send(json_request(Method::DELETE, uri, body, headers)).await
    }

    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Creates a temporary mailbox, returning `(id, address, api key)`.
    pub async fn temporary_mailbox(&self) -> (String, String, String) {
        let response = self.post_json("/api/emails/generate-temporal", Value::Null, &[]).await;
        assert_eq!(response.status, StatusCode::OK);
        let json = response.json();
        (
            json["id"].as_str().unwrap().to_string(),
            json["email"].as_str().unwrap().to_string(),
            json["apiKey"].as_str().unwrap().to_string(),
        )
    }

    /// Delivers a message through the webhook.
    pub async fn deliver(&self, recipient: &str, subject: &str, html: &str) -> TestResponse {
        self.post_form(
            "/api/emails/mailgun",
            &[
                ("sender", "sender@example.com"),
                ("recipient", recipient),
                ("subject", subject),
                ("body-plain", "plain version"),
                ("body-html", html),
            ],
        )
        .await
    }

    /// Registers and logs in a regular user.
    pub async fn register(&self, username: &str) -> TestUser {
        let email = format!("{username}@example.com");
        let response = self
            .post_json(
                "/api/users/register",
                serde_json::json!({
                    "fullName": "Test User",
                    "username": username,
                    "email": email,
                    "password": PASSWORD,
                }),
                &[],
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        self.login(&email).await
    }

    pub async fn login(&self, email: &str) -> TestUser {
        let response = self
            .post_json(
                "/api/users/login",
                serde_json::json!({ "email": email, "password": PASSWORD }),
                &[],
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        let json = response.json();
        let user = self.user_by_email(email).await;
        TestUser {
            id: user.id,
            token: json["token"].as_str().unwrap().to_string(),
            api_key: json["apiKey"].as_str().unwrap().to_string(),
        }
    }

    /// Admins cannot be created through the API.
    pub async fn admin(&self) -> TestUser {
        self.store
            .create_user(NewUser {
                full_name: "Admin".to_string(),
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
                password_hash: hash_password(PASSWORD).unwrap(),
                api_key: Uuid::new_v4().to_string(),
                is_admin: true,
            })
            .await
            .unwrap();
        self.login("admin@example.com").await
    }

    pub async fn user_by_email(&self, email: &str) -> User {
        self.store.find_user_by_email(email).await.unwrap().unwrap()
    }
}

pub fn request(method: Method, uri: &str, headers: &[(&str, &str)], body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body).unwrap()
}

pub fn json_request(
    method: Method,
    uri: &str,
    body: Value,
    headers: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn inbox_uri(address: &str, api_key: Option<&str>) -> String {
    let mut uri = format!("/api/emails/inbox?email={}", urlencoding::encode(address));
    if let Some(key) = api_key {
        uri.push_str(&format!("&apiKey={}", urlencoding::encode(key)));
    }
    uri
}

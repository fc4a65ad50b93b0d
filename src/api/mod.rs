/// HTTP API Layer
///
/// This module provides the REST API and the handful of pages the gate
/// redirects to. It handles:
/// - Login, registration, logout and identity lookup
/// - Workflow CRUD with nested phase/task reconciliation
/// - Login and dashboard pages
///
/// Every request passes the authorization gate before reaching a handler.

// Shared extractors (caller identity, role guards, JSON bodies)
pub mod extract;

// Authentication endpoints (login/register/logout/me)
pub mod auth;

// Workflow management endpoints (GET/POST/PATCH/DELETE)
pub mod workflows;

// Server-rendered landing pages
pub mod pages;

pub use auth::create_auth_routes;
pub use pages::create_page_routes;
pub use workflows::create_workflow_routes;

use std::sync::Arc;

use axum::{http::StatusCode, middleware, response::IntoResponse, routing::get, Json, Router};
use minijinja::Environment;
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::{
    auth::{AuthService, TokenIssuer, UserStorage},
    config::AuthConfig,
    gate,
    workflow::{WorkflowService, WorkflowStorage},
};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Credential verification and registration
    pub auth: AuthService,
    /// Access token signing and verification
    pub tokens: TokenIssuer,
    /// Token lifetimes and cookie security settings
    pub auth_config: Arc<AuthConfig>,
    /// Workflow reconciliation service
    pub workflows: WorkflowService,
    /// Compiled page templates
    pub templates: Arc<Environment<'static>>,
}

impl AppState {
    /// Wire every service onto one database pool
    pub fn new(pool: SqlitePool, auth_config: AuthConfig) -> anyhow::Result<Self> {
        let auth = AuthService::new(UserStorage::new(pool.clone()))
            .map_err(|e| anyhow::anyhow!("Failed to initialize auth service: {}", e))?;

        Ok(Self {
            auth,
            tokens: TokenIssuer::new(&auth_config.secret),
            auth_config: Arc::new(auth_config),
            workflows: WorkflowService::new(WorkflowStorage::new(pool)),
            templates: pages::template_env()?,
        })
    }
}

/// Assemble all routes behind the authorization gate
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(create_auth_routes())
        .merge(create_workflow_routes())
        .merge(create_page_routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate::authorize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "code": "NOT_FOUND" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{password::hash_password, users::InsertOutcome, Identity, Role, AUTH_COOKIE},
        database::connect_in_memory,
        project::ProjectStorage,
    };
    use axum::{
        body::Body,
        http::{header, HeaderMap, Request},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        state: AppState,
        pool: SqlitePool,
    }

    fn auth_config() -> AuthConfig {
        AuthConfig {
            secret: "test-secret".into(),
            production: false,
            token_ttl_secs: 3600,
            session_max_age_secs: 7200,
            inactivity_timeout_secs: 1800,
        }
    }

    async fn test_app() -> TestApp {
        let pool = connect_in_memory().await.unwrap();
        let state = AppState::new(pool.clone(), auth_config()).unwrap();
        TestApp {
            router: create_router(state.clone()),
            state,
            pool,
        }
    }

    impl TestApp {
        /// Store a user with the given role and return a bearer token for them
        async fn token_for(&self, email: &str, role: Role) -> String {
            let users = UserStorage::new(self.pool.clone());
            let hash = hash_password("password123").unwrap();
            let user = match users.insert(Some("Tester"), email, &hash, role).await.unwrap() {
                InsertOutcome::Created(user) => user,
                InsertOutcome::DuplicateEmail => panic!("email already used"),
            };
            self.state.tokens.issue(&Identity::from(&user), 3600).unwrap()
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, HeaderMap, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_string(&body).unwrap()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, headers, json)
        }
    }

    fn workflow_body() -> Value {
        serde_json::json!({
            "name": "Release",
            "phases": [
                { "name": "Build", "order": 0, "tasks": [{ "name": "Compile" }, { "name": "Package" }] },
                { "name": "Ship", "order": 1, "tasks": [{ "name": "Announce", "priority": "LOW" }] }
            ]
        })
    }

    #[tokio::test]
    async fn health_check_is_public() {
        let app = test_app().await;
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_login_me_logout() {
        let app = test_app().await;

        let (status, _, user) = app
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(serde_json::json!({ "name": "Dana", "email": "dana@example.com", "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["role"], "USER");
        assert!(user.get("passwordHash").is_none());

        let (status, headers, login) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": "dana@example.com", "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(login["user"]["id"], user["id"]);
        assert_eq!(login["user"]["email"], "dana@example.com");
        assert_eq!(login["user"]["role"], "USER");

        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with("auth-token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));

        let cookie_pair = cookie.split(';').next().unwrap().to_string();
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .header(header::COOKIE, cookie_pair.clone())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let me: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(me["id"], user["id"]);

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/logout")
                    .header(header::COOKIE, cookie_pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cleared = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cleared.starts_with("auth-token="));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn bad_credentials_share_one_response() {
        let app = test_app().await;
        app.token_for("known@example.com", Role::User).await;

        let (wrong_status, _, wrong) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": "known@example.com", "password": "bad-password" })),
            )
            .await;
        let (unknown_status, _, unknown) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": "ghost@example.com", "password": "password123" })),
            )
            .await;

        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, unknown);
        assert_eq!(wrong["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let app = test_app().await;
        let body = serde_json::json!({ "email": "twice@example.com", "password": "password123" });

        let (first, _, _) = app.send("POST", "/api/auth/register", None, Some(body.clone())).await;
        let (second, _, error) = app.send("POST", "/api/auth/register", None, Some(body)).await;
        assert_eq!(first, StatusCode::CREATED);
        assert_eq!(second, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "User already exists");
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_turned_away() {
        let app = test_app().await;

        let (status, _, body) = app.send("GET", "/api/workflows", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");

        let (status, headers, _) = app.send("GET", "/workflows?page=2", None, None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "/login?callbackUrl=%2Fworkflows%3Fpage%3D2"
        );

        let (status, _, body) = app.send("GET", "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn gate_redirects_insufficient_roles() {
        let app = test_app().await;
        let user = app.token_for("u@example.com", Role::User).await;
        let manager = app.token_for("m@example.com", Role::Manager).await;

        let (status, headers, _) = app.send("GET", "/workflows/new", Some(&user), None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/dashboard?error=AccessDenied");

        let (status, _, _) = app.send("GET", "/workflows/new", Some(&manager), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, headers, _) = app.send("GET", "/login", Some(&user), None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/dashboard");
    }

    #[tokio::test]
    async fn stale_session_is_sent_back_to_login() {
        let app = test_app().await;
        let identity = Identity {
            id: "nobody".into(),
            email: "old@example.com".into(),
            name: None,
            role: Role::Admin,
        };
        let now = chrono::Utc::now().timestamp();
        let token = crate::auth::token::issue_with_times(&app.state.tokens, &identity, now - 1801, now + 3600);

        let (status, headers, _) = app.send("GET", "/dashboard", Some(&token), None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/login?error=SessionExpired");
    }

    #[tokio::test]
    async fn stale_cookie_session_ends_on_login_page() {
        let app = test_app().await;
        let identity = Identity {
            id: "nobody".into(),
            email: "remembered@example.com".into(),
            name: None,
            role: Role::User,
        };
        let now = chrono::Utc::now().timestamp();
        let token = crate::auth::token::issue_with_times(&app.state.tokens, &identity, now - 1801, now + 3600);
        let cookie = format!("{AUTH_COOKIE}={token}");

        // Follow redirects the way a browser would, keeping the stale cookie
        let mut uri = "/dashboard".to_string();
        let mut hops = Vec::new();
        let final_status = loop {
            let response = app
                .router
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(&uri)
                        .header(header::COOKIE, &cookie)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            if response.status() != StatusCode::SEE_OTHER {
                break response.status();
            }
            assert!(hops.len() < 5, "redirect loop: {hops:?}");
            if uri == "/dashboard" {
                let cleared = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
                assert!(cleared.starts_with("auth-token="));
                assert!(cleared.contains("Max-Age=0"));
            }
            uri = response.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_string();
            hops.push(uri.clone());
        };

        assert_eq!(final_status, StatusCode::OK);
        assert_eq!(hops, vec!["/login?error=SessionExpired".to_string()]);

        let (status, _, _) = app.send("GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dashboard_renders_for_signed_in_user() {
        let app = test_app().await;
        let token = app.token_for("page@example.com", Role::Manager).await;

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/dashboard")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Welcome, Tester"));
        assert!(html.contains("/workflows/new"));
    }

    #[tokio::test]
    async fn users_get_403_whatever_the_payload() {
        let app = test_app().await;
        let user = app.token_for("plain@example.com", Role::User).await;

        let (status, _, _) = app
            .send("POST", "/api/workflows", Some(&user), Some(serde_json::json!({ "bogus": true })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = app.send("POST", "/api/workflows", Some(&user), Some(workflow_body())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = app
            .send("PATCH", "/api/workflows/whatever", Some(&user), Some(serde_json::json!([])))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = app.send("DELETE", "/api/workflows/whatever", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = app
            .send("DELETE", "/api/workflows", Some(&user), Some(serde_json::json!({ "ids": [] })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_payloads_list_failing_fields() {
        let app = test_app().await;
        let manager = app.token_for("mgr@example.com", Role::Manager).await;

        let (status, _, body) = app
            .send(
                "POST",
                "/api/workflows",
                Some(&manager),
                Some(serde_json::json!({ "name": "", "phases": [{ "name": "P", "order": -3 }] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"][0]["field"], "name");
        assert_eq!(body["details"][1]["field"], "phases[0].order");

        let (status, _, body) = app
            .send("POST", "/api/workflows", Some(&manager), Some(serde_json::json!({ "phases": 3 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "body");
    }

    #[tokio::test]
    async fn workflow_lifecycle_over_http() {
        let app = test_app().await;
        let admin = app.token_for("admin@example.com", Role::Admin).await;
        let viewer = app.token_for("viewer@example.com", Role::User).await;

        let (status, _, created) = app
            .send("POST", "/api/workflows", Some(&admin), Some(workflow_body()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["phases"][0]["tasks"][1]["name"], "Package");

        let (status, _, fetched) = app
            .send("GET", &format!("/api/workflows/{id}"), Some(&viewer), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let build_id = created["phases"][0]["id"].clone();
        let (status, _, updated) = app
            .send(
                "PATCH",
                &format!("/api/workflows/{id}"),
                Some(&admin),
                Some(serde_json::json!({
                    "description": "Weekly release",
                    "phases": [{ "id": build_id, "name": "Build", "order": 0, "tasks": [{ "name": "Compile" }] }]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["description"], "Weekly release");
        assert_eq!(updated["phases"].as_array().unwrap().len(), 1);
        assert_ne!(updated["phases"][0]["tasks"][0]["id"], created["phases"][0]["tasks"][0]["id"]);

        let (status, _, page) = app
            .send("GET", "/api/workflows?page=1&limit=5&search=REL", Some(&viewer), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["pagination"]["total"], 1);
        assert_eq!(page["workflows"][0]["phaseCount"], 1);

        ProjectStorage::new(app.pool.clone()).create("Sprint 9", &id).await.unwrap();
        let (status, _, conflict) = app
            .send("DELETE", &format!("/api/workflows/{id}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(conflict["error"], "Cannot delete workflow with associated projects");

        let (status, _, _) = app
            .send("DELETE", "/api/workflows", Some(&admin), Some(serde_json::json!({ "ids": [id.clone()] })))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _, _) = app
            .send("GET", &format!("/api/workflows/{id}"), Some(&viewer), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn single_delete_without_projects_succeeds() {
        let app = test_app().await;
        let admin = app.token_for("root@example.com", Role::Admin).await;
        let (_, _, created) = app
            .send("POST", "/api/workflows", Some(&admin), Some(workflow_body()))
            .await;
        let uri = format!("/api/workflows/{}", created["id"].as_str().unwrap());

        let (status, _, body) = app.send("DELETE", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Workflow deleted successfully");

        let (status, _, _) = app.send("DELETE", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_query_parameters_are_validation_errors() {
        let app = test_app().await;
        let token = app.token_for("q@example.com", Role::User).await;

        let (status, _, body) = app.send("GET", "/api/workflows?page=0", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "page");

        let (status, _, body) = app.send("GET", "/api/workflows?limit=abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "query");
    }
}

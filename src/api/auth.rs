/// Authentication endpoints
///
/// Login sets the `auth-token` cookie (HttpOnly, SameSite=Lax, Secure in
/// production) and also returns the token in the body. Logout only clears
/// the cookie; the token itself stays valid until it expires.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    api::{
        extract::{CurrentUser, JsonBody},
        AppState,
    },
    auth::{Identity, AUTH_COOKIE},
    error::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Use the long session lifetime instead of the one-day token
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: Identity,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

pub fn create_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(request): JsonBody<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let identity = state.auth.authenticate(&request.email, &request.password).await?;

    let ttl = if request.remember_me {
        state.auth_config.session_max_age_secs
    } else {
        state.auth_config.token_ttl_secs
    };
    let access_token = state
        .tokens
        .issue(&identity, ttl)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let cookie = Cookie::build((AUTH_COOKIE, access_token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.auth_config.production)
        .path("/")
        .max_age(time::Duration::seconds(ttl));

    tracing::info!("🔑 {} signed in ({})", identity.email, identity.role);
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            access_token,
            user: identity,
        }),
    ))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let user = state
        .auth
        .register(request.name.as_deref(), &request.email, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/logout
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));
    (
        jar,
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    )
}

/// GET /api/auth/me
async fn me(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}

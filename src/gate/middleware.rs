/// Axum middleware applying the gate to every request
///
/// Page requests are answered with redirects; `/api/` requests get JSON
/// errors instead, since a redirect to an HTML page means nothing to an API
/// client.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use super::{decide, Decision, HOME_PATH, LOGIN_PATH};
use crate::{
    api::AppState,
    auth::{token::token_from_headers, AUTH_COOKIE},
    error::AppError,
};

pub async fn authorize(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let token = token_from_headers(request.headers()).map(|raw| state.tokens.verify(&raw));
    if let Some(Err(e)) = &token {
        tracing::debug!("Gate ignoring unusable token on {}: {}", path, e);
    }

    let decision = decide(
        &path,
        &path_and_query,
        token,
        chrono::Utc::now().timestamp(),
        state.auth_config.inactivity_timeout_secs,
    );

    let is_api = path.starts_with("/api/");
    match decision {
        Decision::Allow(identity) => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
        Decision::RedirectHome => Redirect::to(HOME_PATH).into_response(),
        Decision::Unauthenticated { callback } => {
            if is_api {
                AppError::Unauthenticated.into_response()
            } else {
                let target = format!(
                    "{}?callbackUrl={}",
                    LOGIN_PATH,
                    urlencoding::encode(&callback)
                );
                Redirect::to(&target).into_response()
            }
        }
        Decision::SessionExpired => {
            tracing::info!("Session expired by inactivity on {}", path);
            // Clear the stale cookie along with the redirect
            let jar = CookieJar::from_headers(request.headers())
                .remove(Cookie::build(AUTH_COOKIE).path("/"));
            if is_api {
                (jar, AppError::Unauthenticated).into_response()
            } else {
                (jar, Redirect::to(&format!("{LOGIN_PATH}?error=SessionExpired"))).into_response()
            }
        }
        Decision::Forbidden => {
            if is_api {
                AppError::Forbidden.into_response()
            } else {
                Redirect::to(&format!("{HOME_PATH}?error=AccessDenied")).into_response()
            }
        }
    }
}

/// Request extractors shared by the API handlers
///
/// - `CurrentUser`: the authenticated caller (401 otherwise)
/// - `Authorized<R>`: the caller, provided their role covers `R` (403 otherwise)
/// - `JsonBody<T>`: a JSON body whose parse failures become validation errors
///
/// `Authorized` is listed before the body in handler signatures, so an
/// under-privileged caller is refused before their payload is even read.

use std::marker::PhantomData;

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::{
    api::AppState,
    auth::{token::token_from_headers, Identity, Role},
    error::AppError,
    gate,
};

pub struct CurrentUser(pub Identity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Set by the gate middleware when it already verified the token
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(CurrentUser(identity.clone()));
        }

        let token = token_from_headers(&parts.headers).ok_or(AppError::Unauthenticated)?;
        let claims = state.tokens.verify(&token).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            AppError::Unauthenticated
        })?;
        let now = chrono::Utc::now().timestamp();
        if gate::is_stale(&claims, now, state.auth_config.inactivity_timeout_secs) {
            tracing::debug!("Rejected token for {}: session inactive", claims.email);
            return Err(AppError::Unauthenticated);
        }
        Ok(CurrentUser(claims.identity()))
    }
}

/// Minimum role demanded by an `Authorized` extractor
pub trait RoleRequirement {
    const ROLE: Role;
}

pub struct ManagerRole;

impl RoleRequirement for ManagerRole {
    const ROLE: Role = Role::Manager;
}

pub struct AdminRole;

impl RoleRequirement for AdminRole {
    const ROLE: Role = Role::Admin;
}

pub struct Authorized<R>(pub Identity, pub PhantomData<R>);

impl<R> FromRequestParts<AppState> for Authorized<R>
where
    R: RoleRequirement + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;
        identity.require(R::ROLE)?;
        Ok(Authorized(identity, PhantomData))
    }
}

pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(AppError::invalid("body", rejection.body_text())),
        }
    }
}

/// Route authorization gate
///
/// Decides, before any handler runs, whether a request may proceed. The
/// decision is a pure function of the path, the verified token claims and the
/// clock; `middleware` turns it into redirects or JSON errors.
///
/// Access rules are static data: a public allow-list and a prefix → roles
/// table. The role hierarchy (ADMIN ⊇ MANAGER ⊇ USER) is applied through
/// `Role::satisfies_any`, so a table entry only lists the lowest roles it admits.

pub mod middleware;

pub use middleware::authorize;

use crate::auth::{Claims, Identity, Role, TokenError};

/// Paths reachable without a token
pub const PUBLIC_PREFIXES: &[&str] = &[
    "/static",
    "/favicon.ico",
    "/healthz",
    "/api/auth",
    "/login",
    "/register",
    "/forgot-password",
    "/reset-password",
];

/// Role requirements per path prefix; the longest matching prefix wins
pub const ROUTE_ROLES: &[(&str, &[Role])] = &[
    ("/admin", &[Role::Admin]),
    ("/users", &[Role::Admin]),
    ("/workflows/new", &[Role::Manager]),
    ("/reports", &[Role::Manager]),
    ("/workflows", &[Role::User]),
    ("/dashboard", &[Role::User]),
    ("/api/workflows", &[Role::User]),
];

/// Landing page for authenticated users
pub const HOME_PATH: &str = "/dashboard";

/// Login page, the target of every unauthenticated redirect
pub const LOGIN_PATH: &str = "/login";

/// What the gate does with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through, with the caller's identity when known
    Allow(Option<Identity>),
    /// Authenticated caller asked for `/` or the login page
    RedirectHome,
    /// No usable token; `callback` is where to return after login
    Unauthenticated { callback: String },
    /// Token issued longer ago than the inactivity timeout
    SessionExpired,
    /// Token is fine but the role does not cover the route
    Forbidden,
}

/// True when `path` is `prefix` itself or lies below it
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|prefix| matches_prefix(path, prefix))
}

/// Roles admitted to `path`, or `None` when any authenticated user may enter
pub fn required_roles(path: &str) -> Option<&'static [Role]> {
    ROUTE_ROLES
        .iter()
        .filter(|(prefix, _)| matches_prefix(path, prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, roles)| *roles)
}

/// True when the token was issued longer ago than the inactivity timeout
///
/// Tokens are never refreshed per request, so this measures from issue time.
pub fn is_stale(claims: &Claims, now: i64, inactivity_timeout_secs: i64) -> bool {
    now - claims.iat > inactivity_timeout_secs
}

/// Decide the fate of a request
///
/// `token` is the verification result of the request's token, `None` when
/// the request carried none. A stale token does not count as signed in for
/// `/` and the login page, so an expired session can always reach the login form.
pub fn decide(
    path: &str,
    path_and_query: &str,
    token: Option<Result<Claims, TokenError>>,
    now: i64,
    inactivity_timeout_secs: i64,
) -> Decision {
    let claims = token.and_then(Result::ok);
    let stale = claims
        .as_ref()
        .is_some_and(|c| is_stale(c, now, inactivity_timeout_secs));

    if claims.is_some() && !stale && (path == "/" || path == LOGIN_PATH) {
        return Decision::RedirectHome;
    }

    if is_public(path) {
        return Decision::Allow(None);
    }

    let Some(claims) = claims else {
        return Decision::Unauthenticated {
            callback: path_and_query.to_string(),
        };
    };

    if stale {
        return Decision::SessionExpired;
    }

    if let Some(allowed) = required_roles(path) {
        if !claims.role.satisfies_any(allowed) {
            return Decision::Forbidden;
        }
    }

    Decision::Allow(Some(claims.identity()))
}

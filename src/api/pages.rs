/// Server-rendered pages used as gate redirect targets
///
/// Templates are compiled into the binary and rendered with minijinja, which
/// HTML-escapes every interpolated value. Error flags from the query string
/// are mapped to fixed messages and never echoed verbatim.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use minijinja::{context, Environment};
use serde::Deserialize;

use crate::{
    api::{extract::CurrentUser, AppState},
    auth::Role,
};

/// Build the template environment with every page template registered
pub fn template_env() -> anyhow::Result<Arc<Environment<'static>>> {
    let mut env = Environment::new();
    env.add_template("login.html", include_str!("../../templates/login.html"))?;
    env.add_template("dashboard.html", include_str!("../../templates/dashboard.html"))?;
    Ok(Arc::new(env))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFlags {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

pub fn create_page_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/dashboard", get(dashboard_page))
}

fn error_message(flag: Option<&str>) -> Option<&'static str> {
    match flag? {
        "SessionExpired" => Some("Your session has expired. Please sign in again."),
        "AccessDenied" => Some("You do not have access to that page."),
        _ => Some("Something went wrong. Please try again."),
    }
}

/// Only same-site relative paths are accepted as post-login destinations
fn safe_callback(callback: Option<&str>) -> &str {
    match callback {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/dashboard",
    }
}

fn render(env: &Environment<'static>, name: &str, ctx: minijinja::Value) -> Response {
    match env.get_template(name).and_then(|tmpl| tmpl.render(ctx)) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Template error for {}: {}", name, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// GET /login
async fn login_page(State(state): State<AppState>, Query(flags): Query<PageFlags>) -> Response {
    render(
        &state.templates,
        "login.html",
        context! {
            error_message => error_message(flags.error.as_deref()),
            callback_url => safe_callback(flags.callback_url.as_deref()),
        },
    )
}

/// GET /dashboard
async fn dashboard_page(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Query(flags): Query<PageFlags>,
) -> Response {
    render(
        &state.templates,
        "dashboard.html",
        context! {
            display_name => identity.name.clone().unwrap_or_else(|| identity.email.clone()),
            email => identity.email,
            role => identity.role.as_str(),
            can_manage => identity.role.satisfies(Role::Manager),
            error_message => error_message(flags.error.as_deref()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_escape_values() {
        let env = template_env().unwrap();
        let html = env
            .get_template("dashboard.html")
            .unwrap()
            .render(context! {
                display_name => "<script>x</script>",
                email => "a@b.c",
                role => "USER",
                can_manage => false,
            })
            .unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("/workflows/new"));
    }

    #[test]
    fn callbacks_stay_on_site() {
        assert_eq!(safe_callback(Some("/workflows?page=2")), "/workflows?page=2");
        assert_eq!(safe_callback(Some("//evil.example")), "/dashboard");
        assert_eq!(safe_callback(Some("https://evil.example")), "/dashboard");
        assert_eq!(safe_callback(None), "/dashboard");
    }

    #[test]
    fn unknown_error_flags_get_generic_text() {
        assert_eq!(error_message(None), None);
        assert!(error_message(Some("<b>")).unwrap().starts_with("Something"));
    }
}

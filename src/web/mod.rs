// Server-rendered web surface: askama templates, cookie sessions, redirects.

mod error;
mod favorites;
mod templates;
mod users;

pub use error::WebError;
pub use templates::*;

use askama::Template;
use axum::{
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::SESSION_COOKIE;
use crate::AppState;

// Template errors take the generic 500 path like any other server failure
fn render<T: Template>(template: T) -> Result<Response, WebError> {
    Ok(Html(template.render()?).into_response())
}

// The session cookie carries the encrypted user id. No expiry: the token is
// valid until the secret rotates or the cookie is cleared.
fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(users::home).post(users::register))
        .route("/new", get(users::register_form))
        .route("/login", get(users::login_form).post(users::login))
        .route("/logout", get(users::logout))
        .route("/profile", get(users::profile))
        .route(
            "/favorites",
            get(favorites::list_favorites).post(favorites::create_favorite),
        )
        .route("/favorites/:id", delete(favorites::delete_favorite))
        .route("/favorites/:id/comment", post(favorites::add_comment))
        .route("/:id", put(users::update_password))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

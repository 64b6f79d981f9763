//! Account handlers: registration, login, logout, profile, password update.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{self, MaybeUser, SESSION_COOKIE};
use crate::db::User;
use crate::{session, AppState};

use super::error::WebError;
use super::templates::{HomeTemplate, LoginTemplate, ProfileTemplate, RegisterTemplate};
use super::{render, session_cookie};

/// Both "no such user" and "wrong password" redirect here with the identical
/// message so the login form never reveals whether an email is registered.
const BAD_CREDENTIALS_REDIRECT: &str = "/login?message=username+or+password+incorrect";

const EXISTING_USER_REDIRECT: &str = "/login?message=Please+log+in+to+continue.";

// Landing page
pub async fn home(MaybeUser(user): MaybeUser) -> Result<Response, WebError> {
    render(HomeTemplate {
        user: user.map(|u| u.email),
    })
}

// Registration form
pub async fn register_form(MaybeUser(user): MaybeUser) -> Result<Response, WebError> {
    render(RegisterTemplate {
        user: user.map(|u| u.email),
    })
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
}

// Register a new account, or send an already-registered email to the login
// page. Lookup and insert are separate steps; a concurrent registration that
// wins the race surfaces as a unique-constraint conflict on the insert and is
// mapped to the same "please log in" redirect as the lookup hit.
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&form.email)
        .fetch_optional(&state.db)
        .await?;

    if existing.is_some() {
        debug!(email = %form.email, "registration attempt for existing account");
        return Ok(Redirect::to(EXISTING_USER_REDIRECT).into_response());
    }

    let password_hash = auth::hash_password(&form.password)?;
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO users (email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&form.email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await;

    let user_id = match result {
        Ok(r) => r.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            debug!(email = %form.email, "lost registration race to concurrent request");
            return Ok(Redirect::to(EXISTING_USER_REDIRECT).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id, "registered new user");

    let token = session::encode(user_id, &state.session_key)?;
    let jar = jar.add(session_cookie(token));
    Ok((jar, Redirect::to("/profile")).into_response())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

#[derive(Deserialize)]
pub struct LoginQuery {
    pub message: Option<String>,
}

// Login form, with an optional message carried in the query string
pub async fn login_form(
    Query(query): Query<LoginQuery>,
    MaybeUser(user): MaybeUser,
) -> Result<Response, WebError> {
    render(LoginTemplate {
        user: user.map(|u| u.email),
        message: query.message,
    })
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&form.email)
        .fetch_optional(&state.db)
        .await?;

    let Some(user) = user else {
        return Ok(Redirect::to(BAD_CREDENTIALS_REDIRECT).into_response());
    };

    if !auth::verify_password(&form.password, &user.password_hash) {
        return Ok(Redirect::to(BAD_CREDENTIALS_REDIRECT).into_response());
    }

    info!(user_id = user.id, "logging user in");

    let token = session::encode(user.id, &state.session_key)?;
    let jar = jar.add(session_cookie(token));
    Ok((jar, Redirect::to("/profile")).into_response())
}

// Clears the cookie whether or not a session existed; there is no server-side
// session state to invalidate.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/"))
}

pub async fn profile(MaybeUser(user): MaybeUser) -> Result<Response, WebError> {
    let Some(user) = user else {
        return Ok(
            Redirect::to("/login?message=You+must+log+in+to+view+this+page.").into_response(),
        );
    };

    render(ProfileTemplate {
        user: Some(user.email.clone()),
        email: user.email,
        member_since: user.created_at,
    })
}

#[derive(Deserialize)]
pub struct UpdatePasswordForm {
    pub email: String,
    pub password: String,
}

// Set a new password for the account matching the submitted email. The path
// id is legacy surface and not consulted. Matching no account is a no-op.
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Path(_id): Path<String>,
    Form(form): Form<UpdatePasswordForm>,
) -> Result<Response, WebError> {
    let password_hash = auth::hash_password(&form.password)?;
    let now = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE email = ?")
        .bind(&password_hash)
        .bind(&now)
        .bind(&form.email)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        debug!(email = %form.email, "password update for unknown email");
    }

    Ok(Redirect::to("/").into_response())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{cookie_value, form_request, get_request, test_app};
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn register_creates_user_sets_cookie_and_redirects() {
        let (app, state) = test_app().await;

        let response = app
            .oneshot(form_request("POST", "/", "email=a%40x.com&password=p1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/profile");

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("userId="));
        assert!(set_cookie.contains("HttpOnly"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn duplicate_registration_redirects_to_login_without_new_row() {
        let (app, state) = test_app().await;

        app.clone()
            .oneshot(form_request("POST", "/", "email=a%40x.com&password=p1"))
            .await
            .unwrap();
        let response = app
            .oneshot(form_request("POST", "/", "email=a%40x.com&password=other"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?message=Please+log+in+to+continue."
        );
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn losing_the_registration_race_counts_as_existing_user() {
        let (_app, state) = test_app().await;

        sqlx::query(
            "INSERT INTO users (email, password_hash, created_at, updated_at) \
             VALUES ('a@x.com', 'hash', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        )
        .execute(&state.db)
        .await
        .unwrap();

        // The insert a racing registration performs after its lookup missed:
        // the unique constraint on email rejects it
        let err = sqlx::query(
            "INSERT INTO users (email, password_hash, created_at, updated_at) \
             VALUES ('a@x.com', 'other', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        )
        .execute(&state.db)
        .await
        .unwrap_err();

        assert!(super::is_unique_violation(&err));
        // Other database errors must not be mistaken for the race
        assert!(!super::is_unique_violation(&sqlx::Error::RowNotFound));

        // The conflict never creates a second row for the email
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn bad_password_and_unknown_email_get_identical_redirect() {
        let (app, _state) = test_app().await;

        app.clone()
            .oneshot(form_request("POST", "/", "email=a%40x.com&password=right"))
            .await
            .unwrap();

        let wrong_password = app
            .clone()
            .oneshot(form_request(
                "POST",
                "/login",
                "email=a%40x.com&password=wrong",
            ))
            .await
            .unwrap();
        let unknown_email = app
            .oneshot(form_request(
                "POST",
                "/login",
                "email=nobody%40x.com&password=right",
            ))
            .await
            .unwrap();

        assert_eq!(wrong_password.status(), StatusCode::SEE_OTHER);
        assert_eq!(unknown_email.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            wrong_password.headers()[header::LOCATION],
            unknown_email.headers()[header::LOCATION]
        );
        assert!(wrong_password.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn correct_credentials_log_in() {
        let (app, _state) = test_app().await;

        app.clone()
            .oneshot(form_request("POST", "/", "email=a%40x.com&password=p1"))
            .await
            .unwrap();
        let response = app
            .oneshot(form_request(
                "POST",
                "/login",
                "email=a%40x.com&password=p1",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/profile");

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("userId="));
        assert!(set_cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn logout_always_clears_the_cookie() {
        let (app, _state) = test_app().await;

        // No session existed, the cookie is cleared regardless
        let response = app
            .oneshot(get_request("/logout", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("userId="));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn profile_requires_a_session() {
        let (app, _state) = test_app().await;

        let response = app.oneshot(get_request("/profile", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?message=You+must+log+in+to+view+this+page."
        );
    }

    #[tokio::test]
    async fn profile_renders_for_the_session_user() {
        let (app, _state) = test_app().await;

        let register = app
            .clone()
            .oneshot(form_request("POST", "/", "email=a%40x.com&password=p1"))
            .await
            .unwrap();
        let cookie = cookie_value(&register);

        let response = app
            .oneshot(get_request("/profile", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("a@x.com"));
    }

    #[tokio::test]
    async fn tampered_session_cookie_is_treated_as_logged_out() {
        let (app, _state) = test_app().await;

        let response = app
            .oneshot(get_request("/profile", Some("userId=not-a-real-token")))
            .await
            .unwrap();

        // Not a 5xx: a cookie that fails to decode is just "no session"
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn password_update_uses_the_submitted_email() {
        let (app, _state) = test_app().await;

        app.clone()
            .oneshot(form_request("POST", "/", "email=a%40x.com&password=old"))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(form_request(
                "PUT",
                "/1",
                "email=a%40x.com&password=new",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let old = app
            .clone()
            .oneshot(form_request(
                "POST",
                "/login",
                "email=a%40x.com&password=old",
            ))
            .await
            .unwrap();
        assert_eq!(
            old.headers()[header::LOCATION],
            "/login?message=username+or+password+incorrect"
        );

        let new = app
            .oneshot(form_request(
                "POST",
                "/login",
                "email=a%40x.com&password=new",
            ))
            .await
            .unwrap();
        assert_eq!(new.headers()[header::LOCATION], "/profile");
    }
}

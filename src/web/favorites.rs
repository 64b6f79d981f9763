//! Favorites handlers: a shared list of words with definitions and comments.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{MaybeUser, SESSION_COOKIE};
use crate::db::{Comment, Favorite};
use crate::AppState;

use super::error::WebError;
use super::render;
use super::templates::{FavoriteWithComments, FavoritesTemplate};

#[derive(Deserialize)]
pub struct FavoriteForm {
    pub word: String,
    pub definition: String,
}

// Add a word to the shared favorites list. Gated only on the presence of a
// session cookie; the token is not decoded here. Find-or-create on the
// (word, definition) pair: re-adding an existing entry is a no-op.
pub async fn create_favorite(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<FavoriteForm>,
) -> Result<Response, WebError> {
    if jar.get(SESSION_COOKIE).is_none() {
        return Ok(Redirect::to("/login").into_response());
    }

    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO favorites (word, definition, created_at) VALUES (?, ?, ?) \
         ON CONFLICT(word, definition) DO NOTHING",
    )
    .bind(&form.word)
    .bind(&form.definition)
    .bind(&now)
    .execute(&state.db)
    .await?;

    if result.rows_affected() > 0 {
        info!(word = %form.word, "favorite added");
    }

    Ok(Redirect::to("/favorites").into_response())
}

// List every favorite with its comments eagerly loaded. No pagination and no
// per-user filtering: the list is shared.
pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
) -> Result<Response, WebError> {
    let favorites: Vec<Favorite> = sqlx::query_as("SELECT * FROM favorites ORDER BY word")
        .fetch_all(&state.db)
        .await?;

    let comments: Vec<Comment> = sqlx::query_as("SELECT * FROM comments ORDER BY id")
        .fetch_all(&state.db)
        .await?;

    let mut by_favorite: HashMap<i64, Vec<Comment>> = HashMap::new();
    for comment in comments {
        by_favorite.entry(comment.favorite_id).or_default().push(comment);
    }

    let favorites = favorites
        .into_iter()
        .map(|favorite| {
            let comments = by_favorite.remove(&favorite.id).unwrap_or_default();
            FavoriteWithComments { favorite, comments }
        })
        .collect();

    render(FavoritesTemplate {
        user: user.map(|u| u.email),
        favorites,
    })
}

// Delete by id, unconditionally. An unknown id is a no-op, not an error.
pub async fn delete_favorite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let result = sqlx::query("DELETE FROM favorites WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        debug!(id, "delete for unknown favorite");
    } else {
        info!(id, "favorite deleted");
    }

    let back = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("/favorites");
    Ok(Redirect::to(back).into_response())
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub comment: String,
}

// Comment on a favorite. Requires a session that decodes to a real user; the
// comment's author is always the resolved user's id, never a client-supplied
// value.
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, WebError> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login?message=You+must+log+in+to+comment.").into_response());
    };

    // Commenting on a favorite that no longer exists sends the user back to
    // the list instead of tripping the foreign key.
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM favorites WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Ok(Redirect::to("/favorites").into_response());
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("INSERT INTO comments (user_id, favorite_id, comment, created_at) VALUES (?, ?, ?, ?)")
        .bind(user.id)
        .bind(id)
        .bind(&form.comment)
        .bind(&now)
        .execute(&state.db)
        .await?;

    Ok(Redirect::to("/favorites").into_response())
}

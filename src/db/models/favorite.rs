//! Favorite word and comment models.
//!
//! Favorites are a shared list: there is no per-user ownership, only a
//! uniqueness constraint on (word, definition). Comments belong to a favorite
//! and record the authoring user's id.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Favorite {
    pub id: i64,
    pub word: String,
    pub definition: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub favorite_id: i64,
    pub comment: String,
    pub created_at: String,
}

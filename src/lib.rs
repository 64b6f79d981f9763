pub mod auth;
pub mod config;
pub mod db;
pub mod session;
pub mod web;

pub use db::DbPool;

use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    /// AES-256 key derived once at startup from the configured secret.
    /// Read-only for the lifetime of the process.
    pub session_key: [u8; session::KEY_LENGTH],
}

impl AppState {
    pub fn new(config: Config, db: DbPool, session_key: [u8; session::KEY_LENGTH]) -> Self {
        Self {
            config,
            db,
            session_key,
        }
    }
}

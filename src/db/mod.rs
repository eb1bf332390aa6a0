mod from_row;
mod schema;
pub mod queries;

pub use schema::{configure_connection, init_db};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::rate_limit::RateLimitConfig;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every route
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Expected raw `Authorization` header on webhook deliveries (None = not checked)
    pub webhook_auth: Option<String>,
    /// Bearer key for the read API (None = open, dev only)
    pub api_key: Option<String>,
    pub rate_limit: RateLimitConfig,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|c| configure_connection(c));
    Pool::builder().max_size(10).build(manager)
}

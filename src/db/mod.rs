mod from_row;
pub mod queries;

pub use from_row::FromRow;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::Result;
use crate::rate_limit::{RateLimitKey, RateLimiter};
use crate::service::Licensor;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub licensor: Arc<Licensor>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub rate_limit_key: RateLimitKey,
    /// Shared secret for the manual-grant route; `None` disables it
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn db(&self) -> &DbPool {
        self.licensor.db()
    }
}

/// Open a pool on a database file with WAL and a busy timeout, so IMMEDIATE
/// transactions from concurrent requests wait instead of failing.
pub fn create_pool(path: &str, max_size: u32) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
    });
    Ok(Pool::builder().max_size(max_size).build(manager)?)
}

/// Pool with the schema in place, ready to serve.
pub fn open(path: &str, max_size: u32) -> Result<DbPool> {
    let pool = create_pool(path, max_size)?;
    let conn = pool.get()?;
    init_db(&conn)?;
    drop(conn);
    Ok(pool)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS orders (
            out_trade_no TEXT PRIMARY KEY,
            identity TEXT NOT NULL,
            term TEXT NOT NULL,
            amount TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'paid')),
            created_at INTEGER NOT NULL,
            paid_at INTEGER,
            gateway_trade_no TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_orders_identity ON orders(identity);

        CREATE TABLE IF NOT EXISTS activation_tokens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity TEXT NOT NULL,
            term TEXT NOT NULL,
            purchase_time INTEGER NOT NULL,
            signature TEXT NOT NULL,
            token TEXT NOT NULL,
            source TEXT NOT NULL,
            out_trade_no TEXT UNIQUE REFERENCES orders(out_trade_no),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tokens_identity_purchase
            ON activation_tokens(identity, purchase_time);

        CREATE TABLE IF NOT EXISTS trials (
            identity TEXT PRIMARY KEY,
            token TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS subscriptions (
            identity TEXT PRIMARY KEY,
            expire_at INTEGER NOT NULL,
            is_lifetime INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rate_limits (
            key TEXT PRIMARY KEY,
            window_start INTEGER NOT NULL,
            count INTEGER NOT NULL
        );",
    )?;
    Ok(())
}

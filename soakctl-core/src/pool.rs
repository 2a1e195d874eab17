//! Database connection pool management
//!
//! Uses sqlx PgPool with an explicit connection ceiling. The pool is the
//! only state shared between query workers; acquire/release happens inside
//! sqlx whenever a query is executed against `&PgPool`.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use crate::error::{Result, SoakError};

/// Create a PostgreSQL connection pool.
///
/// Connects eagerly so that an unreachable server fails here, before any
/// round starts.
///
/// # Arguments
///
/// * `options` - parsed connection options
/// * `max_connections` - maximum number of connections in the pool
pub async fn create_pool(options: PgConnectOptions, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|source| SoakError::Connect { source })?;

    info!(max_connections, "connection pool ready");
    Ok(pool)
}

//! One-time schema reset and seeding.
//!
//! Runs over its own connection, not the pool, and must finish before the
//! first round. Drops table `j` unconditionally.

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, info};

use crate::error::{Result, SoakError};

/// Number of rows seeded into `j`; every query must return exactly this many.
pub const SEED_ROW_COUNT: usize = SEED_ROWS.len();

/// Literal `data` payloads inserted by the setup script.
pub const SEED_ROWS: [&str; 3] = [
    r#"{ "phones":[ {"type": "mobile", "phone": "001001"} , {"type": "fix", "phone": "002002"} ] }"#,
    r#"{ "phones":[ {"type": "mobile-2", "phone": "001001"} , {"type": "fix-2", "phone": "002002"} ] }"#,
    r#"{ "phones":[ {"type": "mobile-3", "phone": "001001"} , {"type": "fix-3", "phone": "002002"} ] }"#,
];

/// Build the drop/create/insert script.
pub fn setup_script() -> String {
    let mut script =
        String::from("drop table if exists j;\n\ncreate table j(\n\tdata jsonb NOT NULL\n);\n\n");
    for row in SEED_ROWS {
        script.push_str(&format!("insert into j(data) values ('{}');\n", row));
    }
    script
}

/// Reset the schema and seed the fixed dataset.
///
/// Safe to repeat: every run ends in the same three-row state.
pub async fn reset_schema(options: &PgConnectOptions) -> Result<()> {
    let mut conn = PgConnection::connect_with(options)
        .await
        .map_err(|source| SoakError::Connect { source })?;

    let script = setup_script();
    debug!(statements = script.matches(';').count(), "running setup script");

    sqlx::raw_sql(&script)
        .execute(&mut conn)
        .await
        .map_err(|source| SoakError::Setup { source })?;

    conn.close()
        .await
        .map_err(|source| SoakError::Connect { source })?;

    info!(rows = SEED_ROW_COUNT, "schema reset complete");
    Ok(())
}

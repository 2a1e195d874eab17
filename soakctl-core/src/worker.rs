//! A single unit of concurrent work: query, decode, check cardinality.

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::value::RawValue;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::error::{Result, SoakError};
use crate::record::{Record, ResultSet};
use crate::setup::SEED_ROW_COUNT;

/// The fixed read issued by every worker.
pub const QUERY: &str = "select data from j;";

/// Something the round coordinator can launch many copies of at once.
#[async_trait]
pub trait QueryWorker: Send + Sync {
    async fn run(&self) -> Result<ResultSet>;
}

/// Worker that reads the seeded table through the shared pool.
#[derive(Debug, Clone)]
pub struct PgQueryWorker {
    pool: PgPool,
    expected_rows: usize,
}

impl PgQueryWorker {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            expected_rows: SEED_ROW_COUNT,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryWorker for PgQueryWorker {
    async fn run(&self) -> Result<ResultSet> {
        // Executing against &PgPool checks a connection out for the lifetime
        // of the stream and returns it when the stream is dropped.
        let mut rows = sqlx::query(QUERY).fetch(&self.pool);
        let mut result: ResultSet = Vec::with_capacity(self.expected_rows);

        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|source| SoakError::Query { source })?
        {
            let index = result.len();
            let data: Json<Box<RawValue>> = row
                .try_get(0)
                .map_err(|source| SoakError::Column { row: index, source })?;
            result.push(Record::decode(index, data.0.get())?);
        }

        check_row_count(result.len(), self.expected_rows)?;
        Ok(result)
    }
}

/// Fail unless a query returned exactly the seeded number of rows.
pub fn check_row_count(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(SoakError::RowCount { expected, actual });
    }
    Ok(())
}

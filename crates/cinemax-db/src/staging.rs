//! Staging relation reader.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};

use cinemax_core::{Error, RawRecord, Result, StagingReader};

use crate::relation::RelationName;

/// PostgreSQL implementation of StagingReader.
#[derive(Clone)]
pub struct PgStagingReader {
    pool: Pool<Postgres>,
    relation: RelationName,
}

impl PgStagingReader {
    /// Create a reader over `relation`.
    pub fn new(pool: Pool<Postgres>, relation: RelationName) -> Self {
        Self { pool, relation }
    }

    pub fn relation(&self) -> &RelationName {
        &self.relation
    }

    // Columns are cast so loaders that typed release_date as DATE or
    // vote_average as NUMERIC are read the same way as text/float rows.
    fn select_sql(&self) -> String {
        format!(
            "SELECT id::bigint AS id,
                    title::text AS title,
                    overview::text AS overview,
                    poster_path::text AS poster_path,
                    release_date::text AS release_date,
                    vote_average::float8 AS vote_average
             FROM {}
             ORDER BY id",
            self.relation
        )
    }
}

#[async_trait]
impl StagingReader for PgStagingReader {
    async fn fetch_pending(&self) -> Result<Vec<RawRecord>> {
        let start = Instant::now();
        debug!(
            subsystem = "db",
            component = "staging",
            op = "fetch_pending",
            db_table = %self.relation,
            "Reading staging relation"
        );

        let rows = sqlx::query(&self.select_sql())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let records = rows
            .into_iter()
            .map(|row| {
                Ok(RawRecord {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    overview: row.try_get("overview")?,
                    poster_path: row.try_get("poster_path")?,
                    release_date: row.try_get("release_date")?,
                    vote_average: row.try_get("vote_average")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "staging",
            op = "fetch_pending",
            db_table = %self.relation,
            result_count = records.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched staging records"
        );
        Ok(records)
    }
}

//! Production relation: schema bootstrap and merge-on-key upsert.

use std::time::Instant;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info, trace};

use cinemax_core::{Error, ProductionRecord, ProductionRepository, Result};

use crate::relation::RelationName;

/// PostgreSQL implementation of ProductionRepository.
#[derive(Clone)]
pub struct PgProductionRepository {
    pool: Pool<Postgres>,
    relation: RelationName,
    dimension: usize,
}

impl PgProductionRepository {
    /// Create a repository over `relation` whose `embedding` column holds
    /// `dimension`-component vectors.
    pub fn new(pool: Pool<Postgres>, relation: RelationName, dimension: usize) -> Self {
        Self {
            pool,
            relation,
            dimension,
        }
    }

    pub fn relation(&self) -> &RelationName {
        &self.relation
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGINT PRIMARY KEY,
                title TEXT NOT NULL,
                overview TEXT,
                release_year INTEGER,
                rating REAL,
                poster_url TEXT,
                embedding VECTOR({})
            )",
            self.relation, self.dimension
        )
    }

    fn upsert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (id, title, overview, release_year, rating, poster_url, embedding)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 overview = EXCLUDED.overview,
                 release_year = EXCLUDED.release_year,
                 rating = EXCLUDED.rating,
                 poster_url = EXCLUDED.poster_url,
                 embedding = EXCLUDED.embedding",
            self.relation
        )
    }

    fn check_dimensions(&self, records: &[ProductionRecord]) -> Result<()> {
        match records.iter().find(|r| r.dimension() != self.dimension) {
            Some(bad) => Err(Error::InvalidInput(format!(
                "Movie {} has a {}-dimension embedding, expected {}",
                bad.id,
                bad.dimension(),
                self.dimension
            ))),
            None => Ok(()),
        }
    }

    /// Upsert one record inside an existing transaction.
    pub async fn upsert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &ProductionRecord,
    ) -> Result<()> {
        trace!(movie_id = record.id, "Upserting production record");
        sqlx::query(&self.upsert_sql())
            .bind(record.id)
            .bind(&record.title)
            .bind(&record.overview)
            .bind(record.release_year)
            .bind(record.rating)
            .bind(&record.poster_url)
            .bind(&record.embedding)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Count rows in the production relation.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {}", self.relation))
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("count"))
    }

    /// Fetch one production row by identifier.
    pub async fn get(&self, id: i64) -> Result<Option<ProductionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT id, title, overview, release_year, rating, poster_url, embedding
             FROM {}
             WHERE id = $1",
            self.relation
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let embedding: Option<Vector> = row.try_get("embedding")?;
        let embedding = embedding
            .ok_or_else(|| Error::Internal(format!("Movie {} has no embedding", id)))?;

        Ok(Some(ProductionRecord {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            overview: row
                .try_get::<Option<String>, _>("overview")?
                .unwrap_or_default(),
            release_year: row.try_get("release_year")?,
            rating: row.try_get::<Option<f32>, _>("rating")?.unwrap_or(0.0),
            poster_url: row.try_get("poster_url")?,
            embedding,
        }))
    }
}

#[async_trait]
impl ProductionRepository for PgProductionRepository {
    async fn ensure_schema(&self) -> Result<()> {
        debug!(
            subsystem = "db",
            component = "production",
            op = "ensure_schema",
            db_table = %self.relation,
            dimension = self.dimension,
            "Checking for pgvector extension and production table"
        );

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if let Some(schema) = self.relation.schema() {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        sqlx::query(&self.create_table_sql())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "production",
            db_table = %self.relation,
            "Production table ready"
        );
        Ok(())
    }

    async fn upsert(&self, records: &[ProductionRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.check_dimensions(records)?;

        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for record in records {
            // An early return drops `tx`, which rolls the whole batch back.
            self.upsert_tx(&mut tx, record).await?;
        }
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "production",
            op = "upsert",
            db_table = %self.relation,
            result_count = records.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Upserted production records"
        );
        Ok(records.len())
    }
}

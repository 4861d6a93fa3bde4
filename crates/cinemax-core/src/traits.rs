//! Core traits for the pipeline's collaborators.
//!
//! The orchestrator only talks to these interfaces, so PostgreSQL and the
//! embedding provider can be swapped for in-memory doubles in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{IndexedEmbedding, ProductionRecord, RawRecord, Vector};

// =============================================================================
// STAGING
// =============================================================================

/// Source of raw movie rows.
#[async_trait]
pub trait StagingReader: Send + Sync {
    /// Read every row in the staging relation, ordered by identifier.
    ///
    /// An empty relation yields an empty vector, not an error.
    async fn fetch_pending(&self) -> Result<Vec<RawRecord>>;
}

// =============================================================================
// PRODUCTION
// =============================================================================

/// Destination of embedded movie rows.
#[async_trait]
pub trait ProductionRepository: Send + Sync {
    /// Create the vector extension and the production relation if missing.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert or overwrite every record in one transaction.
    ///
    /// Returns the number of records written. On error nothing is written.
    async fn upsert(&self, records: &[ProductionRecord]) -> Result<usize>;
}

// =============================================================================
// EMBEDDING
// =============================================================================

/// Backend that turns texts into embedding vectors.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts in a single provider call.
    ///
    /// Returns one vector per input text, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Like [`embed_texts`](Self::embed_texts), but each vector carries the
    /// index of the input text it belongs to.
    ///
    /// Backends whose provider reports indices should override this. The
    /// default tags vectors by response position.
    async fn embed_indexed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        Ok(self
            .embed_texts(texts)
            .await?
            .into_iter()
            .enumerate()
            .map(|(index, vector)| IndexedEmbedding { index, vector })
            .collect())
    }

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

//! Chunked embedding and vector attachment.

use std::time::Instant;

use tracing::debug;

use cinemax_core::{
    CanonicalRecord, EmbeddingBackend, Error, IndexedEmbedding, ProductionRecord, Result,
};

/// Embed `texts` in consecutive chunks of at most `batch_size`, one backend
/// call per chunk, and concatenate the results in chunk order.
///
/// Each chunk's response must hold exactly one vector per text in the chunk.
/// Indices in the result refer to positions in `texts`.
pub async fn embed_in_chunks(
    backend: &dyn EmbeddingBackend,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<IndexedEmbedding>> {
    if batch_size == 0 {
        return Err(Error::InvalidInput("batch size must be at least 1".to_string()));
    }

    let mut embeddings = Vec::with_capacity(texts.len());
    for (index, chunk) in texts.chunks(batch_size).enumerate() {
        let start = Instant::now();
        let out = backend.embed_indexed(chunk).await?;
        if out.len() != chunk.len() {
            return Err(Error::Embedding(format!(
                "Chunk {} returned {} embeddings for {} texts",
                index,
                out.len(),
                chunk.len()
            )));
        }
        debug!(
            subsystem = "pipeline",
            op = "embed_chunk",
            chunk = index,
            input_count = chunk.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Embedded chunk"
        );
        let offset = index * batch_size;
        embeddings.extend(out.into_iter().map(|e| IndexedEmbedding {
            index: offset + e.index,
            vector: e.vector,
        }));
    }
    Ok(embeddings)
}

/// Pair record i with embedding i.
///
/// The counts must match, embedding i must be tagged with index i, and every
/// vector must have `dimension` components. Otherwise nothing is attached.
pub fn attach_embeddings(
    records: Vec<CanonicalRecord>,
    embeddings: Vec<IndexedEmbedding>,
    dimension: usize,
) -> Result<Vec<ProductionRecord>> {
    if records.len() != embeddings.len() {
        return Err(Error::Embedding(format!(
            "Got {} embeddings for {} records",
            embeddings.len(),
            records.len()
        )));
    }
    for (position, (record, embedding)) in records.iter().zip(&embeddings).enumerate() {
        if embedding.index != position {
            return Err(Error::Embedding(format!(
                "Embedding at position {} belongs to input {}, not movie {}",
                position, embedding.index, record.id
            )));
        }
        let actual = embedding.vector.as_slice().len();
        if actual != dimension {
            return Err(Error::Embedding(format!(
                "Embedding for movie {} has {} dimensions, expected {}",
                record.id, actual, dimension
            )));
        }
    }

    Ok(records
        .into_iter()
        .zip(embeddings)
        .map(|(record, embedding)| record.with_embedding(embedding.vector))
        .collect())
}

//! Core data models for the cinemax pipeline.
//!
//! A movie moves through three shapes: the staging row as the ingestion
//! collaborator loaded it, the canonical in-memory record, and the production
//! row that carries its embedding.

use serde::{Deserialize, Serialize};

/// Embedding vector type (re-exported from pgvector).
pub use pgvector::Vector;

// =============================================================================
// STAGING
// =============================================================================

/// A raw movie row read from the staging relation.
///
/// Every descriptive field is optional because the upstream catalog does not
/// guarantee any of them. The core never mutates these rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    /// Expected as `YYYY-MM-DD`; anything else is tolerated.
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
}

// =============================================================================
// CANONICAL
// =============================================================================

/// A normalized movie, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub release_year: Option<i32>,
    /// Rounded to one decimal place.
    pub rating: f64,
    pub poster_url: Option<String>,
    /// Input text for the embedding model. Never empty.
    pub embedding_text: String,
}

impl CanonicalRecord {
    /// Attach an embedding, producing the row that gets persisted.
    pub fn with_embedding(self, embedding: Vector) -> ProductionRecord {
        ProductionRecord {
            id: self.id,
            title: self.title,
            overview: self.overview,
            release_year: self.release_year,
            rating: self.rating as f32,
            poster_url: self.poster_url,
            embedding,
        }
    }
}

// =============================================================================
// PRODUCTION
// =============================================================================

/// A movie row in the production relation. `id` is the primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRecord {
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub release_year: Option<i32>,
    /// Stored as `REAL`.
    pub rating: f32,
    pub poster_url: Option<String>,
    pub embedding: Vector,
}

impl ProductionRecord {
    /// Number of components in the attached embedding.
    pub fn dimension(&self) -> usize {
        self.embedding.as_slice().len()
    }
}

// =============================================================================
// EMBEDDING
// =============================================================================

/// A vector tagged with the position of the input text it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEmbedding {
    pub index: usize,
    pub vector: Vector,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical() -> CanonicalRecord {
        CanonicalRecord {
            id: 42,
            title: "Heat".to_string(),
            overview: "A heist.".to_string(),
            release_year: Some(1995),
            rating: 7.9,
            poster_url: None,
            embedding_text: "Movie Title: Heat. Overview: A heist.".to_string(),
        }
    }

    #[test]
    fn test_with_embedding_copies_fields() {
        let record = canonical().with_embedding(Vector::from(vec![0.5; 4]));
        assert_eq!(record.id, 42);
        assert_eq!(record.title, "Heat");
        assert_eq!(record.overview, "A heist.");
        assert_eq!(record.release_year, Some(1995));
        assert!((record.rating - 7.9).abs() < f32::EPSILON);
        assert_eq!(record.poster_url, None);
        assert_eq!(record.dimension(), 4);
    }

    #[test]
    fn test_raw_record_deserializes_nulls() {
        let json = r#"{"id": 7, "title": null, "overview": null, "poster_path": null,
                       "release_date": null, "vote_average": null}"#;
        let raw: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(raw, RawRecord { id: 7, ..Default::default() });
    }
}

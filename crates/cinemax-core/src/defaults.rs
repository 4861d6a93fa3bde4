//! Centralized default constants for the cinemax pipeline.
//!
//! Every crate reads its defaults from here so the binary, the backends and
//! the tests agree on one set of values.

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Base URL prepended to a TMDB `poster_path`.
pub const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// Overview substituted when the staging row has none.
pub const OVERVIEW_PLACEHOLDER: &str = "No overview available.";

/// Upper bound of the TMDB vote scale.
pub const RATING_MAX: f64 = 10.0;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Gemini API host.
pub const GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Default embedding model name (Gemini).
pub const EMBED_MODEL: &str = "models/embedding-001";

/// Task type sent with every document embedding request.
pub const EMBED_TASK_TYPE: &str = "RETRIEVAL_DOCUMENT";

/// Embedding vector dimension for embedding-001.
pub const EMBED_DIMENSION: usize = 768;

/// Texts per provider call. Gemini rejects batches above 100 entries.
pub const EMBED_BATCH_SIZE: usize = 100;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Embedding calls slower than this are logged at WARN.
pub const EMBED_SLOW_THRESHOLD_MS: u64 = 5000;

// =============================================================================
// DATABASE
// =============================================================================

pub const DB_HOST: &str = "localhost";
pub const DB_PORT: u16 = 5432;
pub const DB_NAME: &str = "cinemax_db";
pub const DB_USER: &str = "postgres";
pub const DB_PASSWORD: &str = "password";

/// Relation the ingestion collaborator loads raw rows into.
pub const STAGING_TABLE: &str = "tmdb_data.raw_movies";

/// Relation holding the embedded production rows.
pub const PRODUCTION_TABLE: &str = "public.movies_production";

/// The pipeline runs sequentially on one connection.
pub const DB_MAX_CONNECTIONS: u32 = 1;

/// Connection acquire timeout (seconds).
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

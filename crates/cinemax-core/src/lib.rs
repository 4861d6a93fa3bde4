//! # cinemax-core
//!
//! Core types, traits, and normalization for the cinemax movie pipeline.
//!
//! This crate provides the domain records that flow from staging to
//! production, the pure [`RecordNormalizer`], and the trait seams
//! ([`StagingReader`], [`ProductionRepository`], [`EmbeddingBackend`]) that
//! the database and inference crates implement.

pub mod config;
pub mod defaults;
pub mod error;
pub mod models;
pub mod normalize;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{EnvSource, ProcessEnv};
pub use error::{Error, Result};
pub use models::*;
pub use normalize::{embedding_text, parse_release_year, round_rating, RecordNormalizer};
pub use traits::*;

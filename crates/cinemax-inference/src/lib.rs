//! # cinemax-inference
//!
//! Embedding backends for the cinemax pipeline.
//!
//! The production backend is [`GeminiBackend`], which sends one
//! `batchEmbedContents` request per call and checks that the response holds
//! one vector of the configured dimension per input text.
//!
//! ## Features
//!
//! - `mock`: deterministic [`mock::MockEmbeddingBackend`] for tests in
//!   dependent crates

pub mod gemini;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use gemini::{validate_batch, GeminiBackend, GeminiConfig};

// Re-export core trait
pub use cinemax_core::EmbeddingBackend;

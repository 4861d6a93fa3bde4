//! Mock embedding backend for deterministic testing.
//!
//! Every text maps to a fixed pseudo-random unit vector, so a test can check
//! that the vector stored for a record is the one computed from that record's
//! own text. Faults (reordering, short responses, outright failure) can be
//! switched on to exercise the pipeline's error paths.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cinemax_inference::mock::MockEmbeddingBackend;
//!
//! let backend = MockEmbeddingBackend::new(8);
//! let vectors = backend.embed_texts(&["a".to_string()]).await?;
//! assert_eq!(vectors[0], MockEmbeddingBackend::expected_vector("a", 8));
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cinemax_core::{EmbeddingBackend, Error, IndexedEmbedding, Result, Vector};

/// How the mock misbehaves, if at all.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MockFault {
    /// One vector per text, in order.
    #[default]
    None,
    /// Correct vectors, each tagged with its true index, returned in
    /// reverse order.
    Reversed,
    /// Last vector of every batch omitted.
    DropLast,
    /// Every call fails with this message.
    Fail(String),
}

/// Mock embedding backend for testing.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
    fault: MockFault,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl MockEmbeddingBackend {
    /// Create a well-behaved mock producing vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fault: MockFault::None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Switch on a fault.
    pub fn with_fault(mut self, fault: MockFault) -> Self {
        self.fault = fault;
        self
    }

    /// Batch sizes of every embedding call so far, in call order.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    /// The vector this mock returns for `text`.
    pub fn expected_vector(text: &str, dimension: usize) -> Vector {
        Vector::from(generate_with_seed(fnv1a(text), dimension))
    }
}

fn fnv1a(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn generate_with_seed(seed: u64, dimension: usize) -> Vec<f32> {
    let mut vec = vec![0.0; dimension];
    let mut state = seed;

    // Simple LCG for deterministic pseudo-random values
    for item in vec.iter_mut() {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        *item = ((state % 1000) as f32) / 1000.0 - 0.5;
    }

    let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        vec.iter_mut().for_each(|x| *x /= magnitude);
    }
    vec
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let tagged = self.embed_indexed(texts).await?;
        Ok(tagged.into_iter().map(|e| e.vector).collect())
    }

    async fn embed_indexed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        self.calls.lock().unwrap().push(texts.len());

        let mut out: Vec<IndexedEmbedding> = texts
            .iter()
            .enumerate()
            .map(|(index, t)| IndexedEmbedding {
                index,
                vector: Self::expected_vector(t, self.dimension),
            })
            .collect();

        match &self.fault {
            MockFault::None => {}
            MockFault::Reversed => out.reverse(),
            MockFault::DropLast => {
                out.pop();
            }
            MockFault::Fail(message) => return Err(Error::Embedding(message.clone())),
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }
}

//! Gemini embedding backend implementation.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use cinemax_core::config::{parse_var, required_var, string_var};
use cinemax_core::{defaults, EmbeddingBackend, EnvSource, Error, Result, Vector};

/// Default Gemini API endpoint.
pub const DEFAULT_GEMINI_URL: &str = defaults::GEMINI_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Task type for documents that will be searched against.
pub const DEFAULT_TASK_TYPE: &str = defaults::EMBED_TASK_TYPE;

/// Default embedding dimension for embedding-001.
pub const DEFAULT_DIMENSION: usize = defaults::EMBED_DIMENSION;

/// Timeout for embedding requests (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = defaults::EMBED_TIMEOUT_SECS;

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini backend.
#[derive(Clone)]
pub struct GeminiConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key. Required.
    pub api_key: String,
    /// Model to use for embeddings, e.g. `models/embedding-001`.
    pub embed_model: String,
    /// Task type tag sent with every text.
    pub task_type: String,
    /// Expected embedding dimension.
    pub embed_dimension: usize,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("embed_model", &self.embed_model)
            .field("task_type", &self.task_type)
            .field("embed_dimension", &self.embed_dimension)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl GeminiConfig {
    /// Default settings with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_GEMINI_URL.to_string(),
            api_key: api_key.into(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            task_type: DEFAULT_TASK_TYPE.to_string(),
            embed_dimension: DEFAULT_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read settings from the environment.
    ///
    /// `GOOGLE_API_KEY` is required; a missing key is a configuration error so
    /// the pipeline refuses to start.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let config = Self {
            base_url: string_var(env, "GEMINI_BASE_URL", DEFAULT_GEMINI_URL),
            api_key: required_var(env, "GOOGLE_API_KEY")?,
            embed_model: string_var(env, "GEMINI_EMBED_MODEL", DEFAULT_EMBED_MODEL),
            task_type: DEFAULT_TASK_TYPE.to_string(),
            embed_dimension: parse_var(env, "EMBED_DIM", DEFAULT_DIMENSION)?,
            timeout_seconds: parse_var(env, "EMBED_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
        };

        if config.embed_dimension == 0 {
            return Err(Error::Config("EMBED_DIM must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Model name in `models/<id>` resource form.
    pub fn model_resource(&self) -> String {
        if self.embed_model.starts_with("models/") {
            self.embed_model.clone()
        } else {
            format!("models/{}", self.embed_model)
        }
    }
}

/// Gemini embedding backend.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
    model_resource: String,
}

impl GeminiBackend {
    /// Create a new Gemini backend with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing Gemini backend: url={}, embed={}, dim={}",
            config.base_url, config.embed_model, config.embed_dimension
        );

        let model_resource = config.model_resource();
        Ok(Self {
            client,
            config,
            model_resource,
        })
    }

    /// Create from environment variables.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        Self::new(GeminiConfig::from_env(env)?)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/{}:batchEmbedContents",
            self.config.base_url.trim_end_matches('/'),
            self.model_resource
        )
    }
}

/// Check that a provider response lines up with its request: one vector per
/// input text, each of the expected dimension.
pub fn validate_batch(expected: usize, dimension: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::Embedding(format!(
            "Provider returned {} embeddings for {} texts",
            vectors.len(),
            expected
        )));
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimension) {
        return Err(Error::Embedding(format!(
            "Embedding {} has {} dimensions, expected {}",
            i,
            v.len(),
            dimension
        )));
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    task_type: String,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl EmbeddingBackend for GeminiBackend {
    #[instrument(
        skip(self, texts),
        fields(
            subsystem = "inference",
            component = "gemini",
            op = "embed_texts",
            model = %self.config.embed_model,
            input_count = texts.len()
        )
    )]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: self.model_resource.clone(),
                    content: Content {
                        parts: vec![Part { text: text.clone() }],
                    },
                    task_type: self.config.task_type.clone(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<GeminiErrorResponse>(&body) {
                Ok(err) => match err.error.status {
                    Some(code) => format!("{} ({})", err.error.message, code),
                    None => err.error.message,
                },
                Err(_) => body,
            };
            return Err(Error::Embedding(format!(
                "Gemini returned {}: {}",
                status, message
            )));
        }

        let result: BatchEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        let values: Vec<Vec<f32>> = result.embeddings.into_iter().map(|e| e.values).collect();
        validate_batch(texts.len(), self.config.embed_dimension, &values)?;

        let vectors: Vec<Vector> = values.into_iter().map(Vector::from).collect();
        let elapsed = start.elapsed().as_millis() as u64;

        debug!(
            result_count = vectors.len(),
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > defaults::EMBED_SLOW_THRESHOLD_MS {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

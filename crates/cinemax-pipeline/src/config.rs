//! Pipeline configuration, read once from the environment at startup.

use cinemax_core::config::{parse_var, string_var};
use cinemax_core::{defaults, EnvSource, Error, Result};
use cinemax_db::{DatabaseConfig, PoolConfig, RelationName};
use cinemax_inference::GeminiConfig;

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub gemini: GeminiConfig,
    pub staging: RelationName,
    pub production: RelationName,
    /// Texts per embedding call.
    pub batch_size: usize,
    pub poster_base_url: String,
}

impl PipelineConfig {
    /// Read every setting from `env`.
    ///
    /// Fails with [`Error::Config`] when `GOOGLE_API_KEY` is missing, a numeric
    /// value does not parse, `EMBED_BATCH_SIZE` is zero, or a relation name is
    /// not a plain identifier.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let gemini = GeminiConfig::from_env(env)?;
        let database = DatabaseConfig::from_env(env)?;

        let batch_size = parse_var(env, "EMBED_BATCH_SIZE", defaults::EMBED_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(Error::Config("EMBED_BATCH_SIZE must be at least 1".to_string()));
        }

        Ok(Self {
            database,
            pool: PoolConfig::default(),
            gemini,
            staging: relation_var(env, "STAGING_TABLE", defaults::STAGING_TABLE)?,
            production: relation_var(env, "PRODUCTION_TABLE", defaults::PRODUCTION_TABLE)?,
            batch_size,
            poster_base_url: string_var(env, "POSTER_BASE_URL", defaults::POSTER_BASE_URL),
        })
    }

    /// Embedding dimension the production relation is declared with.
    pub fn dimension(&self) -> usize {
        self.gemini.embed_dimension
    }
}

fn relation_var(env: &dyn EnvSource, key: &str, default: &str) -> Result<RelationName> {
    let value = string_var(env, key, default);
    RelationName::parse(&value).map_err(|e| Error::Config(format!("{}: {}", key, e)))
}

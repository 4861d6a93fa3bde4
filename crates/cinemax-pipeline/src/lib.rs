//! # cinemax-pipeline
//!
//! Reads raw movie rows from staging, normalizes them, embeds them with the
//! configured provider, and upserts the result into the production relation.
//!
//! ```rust,ignore
//! use cinemax_core::ProcessEnv;
//! use cinemax_pipeline::{run_pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_env(&ProcessEnv)?;
//! let summary = run_pipeline(&config).await?;
//! println!("{}", summary);
//! ```

pub mod config;
pub mod embed;
pub mod logging;
pub mod orchestrator;

use std::sync::Arc;

use tracing::info;

use cinemax_core::{RecordNormalizer, Result};
use cinemax_db::Database;
use cinemax_inference::GeminiBackend;

pub use config::PipelineConfig;
pub use embed::{attach_embeddings, embed_in_chunks};
pub use logging::LogSettings;
pub use orchestrator::{PipelineOrchestrator, PipelineState, RunSummary};

/// Connect, run once, and close the connection whether or not the run
/// succeeded.
pub async fn run_pipeline(config: &PipelineConfig) -> Result<RunSummary> {
    let embedder = GeminiBackend::new(config.gemini.clone())?;

    info!(
        subsystem = "pipeline",
        target_db = %config.database.display_target(),
        staging = %config.staging,
        production = %config.production,
        "Connecting to database"
    );
    let db = Database::connect(
        &config.database,
        config.pool.clone(),
        config.staging.clone(),
        config.production.clone(),
        config.dimension(),
    )
    .await?;

    let mut orchestrator = PipelineOrchestrator::new(
        Arc::new(db.staging.clone()),
        Arc::new(db.production.clone()),
        Arc::new(embedder),
        RecordNormalizer::new(config.poster_base_url.clone()),
        config.batch_size,
    );
    let result = orchestrator.run().await;

    db.close().await;
    result
}

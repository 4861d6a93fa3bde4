//! `cinemax-transform`: one pass of the transform / embed / upsert pipeline.

use std::process::ExitCode;

use cinemax_core::ProcessEnv;
use cinemax_pipeline::{run_pipeline, LogSettings, PipelineConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _guard = LogSettings::from_env(&ProcessEnv).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env(&ProcessEnv)?;
    let summary = run_pipeline(&config).await?;
    println!("{}", summary);
    Ok(())
}

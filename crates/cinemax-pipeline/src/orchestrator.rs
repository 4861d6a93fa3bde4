//! The transform / embed / upsert run.
//!
//! One run walks `Idle → Bootstrapped → Fetched → Embedded → Persisted`.
//! Any failure moves it to `Aborted` and nothing reaches the production
//! relation unless the upsert itself commits.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};
use uuid::Uuid;

use cinemax_core::{
    EmbeddingBackend, Error, ProductionRepository, RecordNormalizer, Result, StagingReader,
};

use crate::embed::{attach_embeddings, embed_in_chunks};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Bootstrapped,
    Fetched,
    Embedded,
    Persisted,
    Aborted,
}

impl PipelineState {
    /// `Persisted` and `Aborted` end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Persisted | PipelineState::Aborted)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Bootstrapped => "bootstrapped",
            PipelineState::Fetched => "fetched",
            PipelineState::Embedded => "embedded",
            PipelineState::Persisted => "persisted",
            PipelineState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Staging rows read.
    pub fetched: usize,
    /// Vectors attached to records.
    pub embedded: usize,
    /// Rows upserted into production.
    pub written: usize,
    pub state: PipelineState,
    pub duration_ms: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {}, embedded {}, written {}",
            self.fetched, self.embedded, self.written
        )
    }
}

#[derive(Default)]
struct Counts {
    fetched: usize,
    embedded: usize,
    written: usize,
}

/// Drives a single pipeline run over the three collaborators.
pub struct PipelineOrchestrator {
    staging: Arc<dyn StagingReader>,
    production: Arc<dyn ProductionRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
    normalizer: RecordNormalizer,
    batch_size: usize,
    state: PipelineState,
}

impl PipelineOrchestrator {
    pub fn new(
        staging: Arc<dyn StagingReader>,
        production: Arc<dyn ProductionRepository>,
        embedder: Arc<dyn EmbeddingBackend>,
        normalizer: RecordNormalizer,
        batch_size: usize,
    ) -> Self {
        Self {
            staging,
            production,
            embedder,
            normalizer,
            batch_size,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Execute the run. An orchestrator runs at most once.
    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.state != PipelineState::Idle {
            return Err(Error::Internal(format!(
                "Pipeline already ran (state: {})",
                self.state
            )));
        }

        let run_id = Uuid::now_v7();
        let start = Instant::now();
        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            op = "run",
            %run_id,
            model = self.embedder.model_name(),
            batch_size = self.batch_size,
            "Pipeline run started"
        );

        match self.execute(run_id).await {
            Ok(counts) => {
                let summary = RunSummary {
                    run_id,
                    fetched: counts.fetched,
                    embedded: counts.embedded,
                    written: counts.written,
                    state: self.state,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                info!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    op = "run",
                    %run_id,
                    fetched = summary.fetched,
                    embedded = summary.embedded,
                    written = summary.written,
                    duration_ms = summary.duration_ms,
                    "Pipeline run complete"
                );
                Ok(summary)
            }
            Err(e) => {
                let failed_in = self.state;
                self.transition(run_id, PipelineState::Aborted);
                error!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    op = "run",
                    %run_id,
                    failed_in = %failed_in,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Pipeline run aborted"
                );
                Err(e)
            }
        }
    }

    async fn execute(&mut self, run_id: Uuid) -> Result<Counts> {
        self.production.ensure_schema().await?;
        self.transition(run_id, PipelineState::Bootstrapped);

        let raws = self.staging.fetch_pending().await?;
        self.transition(run_id, PipelineState::Fetched);

        if raws.is_empty() {
            info!(%run_id, "No staging records to process");
            self.transition(run_id, PipelineState::Persisted);
            return Ok(Counts::default());
        }

        let (records, texts) = self.normalizer.normalize_all(&raws);
        let embeddings =
            embed_in_chunks(self.embedder.as_ref(), &texts, self.batch_size).await?;
        let rows = attach_embeddings(records, embeddings, self.embedder.dimension())?;
        self.transition(run_id, PipelineState::Embedded);

        let written = self.production.upsert(&rows).await?;
        self.transition(run_id, PipelineState::Persisted);

        Ok(Counts {
            fetched: raws.len(),
            embedded: rows.len(),
            written,
        })
    }

    fn transition(&mut self, run_id: Uuid, next: PipelineState) {
        debug!(%run_id, from = %self.state, to = %next, "Pipeline state change");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use cinemax_core::{ProductionRecord, RawRecord, Vector};
    use cinemax_inference::mock::{MockEmbeddingBackend, MockFault};

    const DIM: usize = 8;

    // ==========================================================================
    // In-memory collaborators
    // ==========================================================================

    #[derive(Default)]
    struct MemoryStaging {
        rows: Mutex<Vec<RawRecord>>,
    }

    impl MemoryStaging {
        fn with(rows: Vec<RawRecord>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
            })
        }

        fn replace(&self, rows: Vec<RawRecord>) {
            *self.rows.lock().unwrap() = rows;
        }
    }

    #[async_trait]
    impl StagingReader for MemoryStaging {
        async fn fetch_pending(&self) -> Result<Vec<RawRecord>> {
            let mut rows = self.rows.lock().unwrap().clone();
            rows.sort_by_key(|r| r.id);
            Ok(rows)
        }
    }

    #[derive(Default)]
    struct MemoryProduction {
        rows: Mutex<BTreeMap<i64, ProductionRecord>>,
        bootstrapped: Mutex<bool>,
        upsert_calls: Mutex<usize>,
        fail_bootstrap: bool,
    }

    impl MemoryProduction {
        fn rows(&self) -> Vec<ProductionRecord> {
            self.rows.lock().unwrap().values().cloned().collect()
        }

        fn upsert_calls(&self) -> usize {
            *self.upsert_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ProductionRepository for MemoryProduction {
        async fn ensure_schema(&self) -> Result<()> {
            if self.fail_bootstrap {
                return Err(Error::Internal("extension \"vector\" is not available".into()));
            }
            *self.bootstrapped.lock().unwrap() = true;
            Ok(())
        }

        async fn upsert(&self, records: &[ProductionRecord]) -> Result<usize> {
            *self.upsert_calls.lock().unwrap() += 1;
            let mut rows = self.rows.lock().unwrap();
            for record in records {
                rows.insert(record.id, record.clone());
            }
            Ok(records.len())
        }
    }

    fn alpha() -> RawRecord {
        RawRecord {
            id: 1,
            title: Some("Alpha".to_string()),
            overview: None,
            poster_path: Some("/a.jpg".to_string()),
            release_date: Some("2020-05-01".to_string()),
            vote_average: Some(7.86),
        }
    }

    fn raw(id: i64, title: &str) -> RawRecord {
        RawRecord {
            id,
            title: Some(title.to_string()),
            overview: Some(format!("About {}", title)),
            release_date: Some("1999-12-31".to_string()),
            vote_average: Some(6.0),
            ..Default::default()
        }
    }

    fn orchestrator(
        staging: Arc<MemoryStaging>,
        production: Arc<MemoryProduction>,
        backend: MockEmbeddingBackend,
        batch_size: usize,
    ) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            staging,
            production,
            Arc::new(backend),
            RecordNormalizer::default(),
            batch_size,
        )
    }

    fn expected(text: &str) -> Vector {
        MockEmbeddingBackend::expected_vector(text, DIM)
    }

    // ==========================================================================
    // Successful runs
    // ==========================================================================

    #[tokio::test]
    async fn test_empty_staging_completes_with_zero_rows() {
        let production = Arc::new(MemoryProduction::default());
        let backend = MockEmbeddingBackend::new(DIM);
        let mut pipeline =
            orchestrator(MemoryStaging::with(vec![]), production.clone(), backend.clone(), 10);

        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.written, 0);
        assert_eq!(summary.state, PipelineState::Persisted);
        assert_eq!(pipeline.state(), PipelineState::Persisted);
        assert!(*production.bootstrapped.lock().unwrap());
        assert_eq!(production.upsert_calls(), 0);
        assert!(backend.calls().is_empty());
        assert_eq!(summary.to_string(), "processed 0, embedded 0, written 0");
    }

    #[tokio::test]
    async fn test_alpha_scenario() {
        let production = Arc::new(MemoryProduction::default());
        let mut pipeline = orchestrator(
            MemoryStaging::with(vec![alpha()]),
            production.clone(),
            MockEmbeddingBackend::new(DIM),
            10,
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.to_string(), "processed 1, embedded 1, written 1");

        let rows = production.rows();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.id, 1);
        assert_eq!(row.title, "Alpha");
        assert_eq!(row.overview, "No overview available.");
        assert_eq!(row.release_year, Some(2020));
        assert!((row.rating - 7.9).abs() < 1e-6);
        assert_eq!(
            row.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/a.jpg")
        );
        assert_eq!(
            row.embedding,
            expected("Movie Title: Alpha. Overview: No overview available.")
        );
    }

    #[tokio::test]
    async fn test_vectors_stay_with_their_records_across_chunks() {
        let staging: Vec<RawRecord> = (1..=7).map(|id| raw(id, &format!("Movie {}", id))).collect();
        let production = Arc::new(MemoryProduction::default());
        let backend = MockEmbeddingBackend::new(DIM);
        let mut pipeline =
            orchestrator(MemoryStaging::with(staging), production.clone(), backend.clone(), 3);

        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.written, 7);
        assert_eq!(backend.calls(), vec![3, 3, 1]);
        for row in production.rows() {
            let text = format!("Movie Title: {}. Overview: About {}", row.title, row.title);
            assert_eq!(row.embedding, expected(&text), "movie {}", row.id);
        }
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let staging = MemoryStaging::with(vec![alpha(), raw(2, "Beta")]);
        let production = Arc::new(MemoryProduction::default());

        orchestrator(staging.clone(), production.clone(), MockEmbeddingBackend::new(DIM), 10)
            .run()
            .await
            .unwrap();
        let first = production.rows();

        orchestrator(staging, production.clone(), MockEmbeddingBackend::new(DIM), 10)
            .run()
            .await
            .unwrap();

        assert_eq!(production.rows(), first);
        assert_eq!(production.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_changed_title_overwrites_in_place() {
        let staging = MemoryStaging::with(vec![alpha(), raw(2, "Beta")]);
        let production = Arc::new(MemoryProduction::default());

        orchestrator(staging.clone(), production.clone(), MockEmbeddingBackend::new(DIM), 10)
            .run()
            .await
            .unwrap();

        let mut renamed = alpha();
        renamed.title = Some("Alpha Prime".to_string());
        staging.replace(vec![renamed, raw(2, "Beta")]);

        orchestrator(staging, production.clone(), MockEmbeddingBackend::new(DIM), 10)
            .run()
            .await
            .unwrap();

        let rows = production.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].title, "Alpha Prime");
        assert_eq!(
            rows[0].embedding,
            expected("Movie Title: Alpha Prime. Overview: No overview available.")
        );
    }

    // ==========================================================================
    // Faulty providers
    // ==========================================================================

    #[tokio::test]
    async fn test_reordered_provider_aborts_before_persist() {
        let production = Arc::new(MemoryProduction::default());
        let mut pipeline = orchestrator(
            MemoryStaging::with(vec![raw(1, "One"), raw(2, "Two")]),
            production.clone(),
            MockEmbeddingBackend::new(DIM).with_fault(MockFault::Reversed),
            10,
        );

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, Error::Embedding(_)));
        assert!(err.to_string().contains("belongs to input 1, not movie 1"));
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        assert_eq!(production.upsert_calls(), 0);
        assert!(production.rows().is_empty());
    }

    #[tokio::test]
    async fn test_short_response_aborts_before_persist() {
        let production = Arc::new(MemoryProduction::default());
        let mut pipeline = orchestrator(
            MemoryStaging::with(vec![raw(1, "One"), raw(2, "Two"), raw(3, "Three")]),
            production.clone(),
            MockEmbeddingBackend::new(DIM).with_fault(MockFault::DropLast),
            10,
        );

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        assert_eq!(production.upsert_calls(), 0);
        assert!(production.rows().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_dimension_aborts_before_persist() {
        let production = Arc::new(MemoryProduction::default());
        let mut pipeline = PipelineOrchestrator::new(
            MemoryStaging::with(vec![alpha()]),
            production.clone(),
            Arc::new(WrongDimension),
            RecordNormalizer::default(),
            10,
        );

        let err = pipeline.run().await.unwrap_err();

        assert!(err.to_string().contains("movie 1 has 2 dimensions, expected 8"));
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        assert_eq!(production.upsert_calls(), 0);
    }

    struct WrongDimension;

    #[async_trait]
    impl EmbeddingBackend for WrongDimension {
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
            Ok(texts.iter().map(|_| Vector::from(vec![0.5; 2])).collect())
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn model_name(&self) -> &str {
            "wrong-dimension"
        }
    }

    #[tokio::test]
    async fn test_provider_failure_aborts() {
        let production = Arc::new(MemoryProduction::default());
        let mut pipeline = orchestrator(
            MemoryStaging::with(vec![alpha()]),
            production.clone(),
            MockEmbeddingBackend::new(DIM).with_fault(MockFault::Fail("quota exceeded".into())),
            10,
        );

        let err = pipeline.run().await.unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        assert!(production.rows().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_failure_aborts_before_fetch() {
        let production = Arc::new(MemoryProduction {
            fail_bootstrap: true,
            ..Default::default()
        });
        let backend = MockEmbeddingBackend::new(DIM);
        let mut pipeline =
            orchestrator(MemoryStaging::with(vec![alpha()]), production, backend.clone(), 10);

        assert!(pipeline.run().await.is_err());
        assert_eq!(pipeline.state(), PipelineState::Aborted);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_orchestrator_runs_once() {
        let mut pipeline = orchestrator(
            MemoryStaging::with(vec![]),
            Arc::new(MemoryProduction::default()),
            MockEmbeddingBackend::new(DIM),
            10,
        );
        pipeline.run().await.unwrap();

        let err = pipeline.run().await.unwrap_err();
        assert!(err.to_string().contains("already ran"));
    }

    #[test]
    fn test_state_display_and_terminal() {
        assert_eq!(PipelineState::Embedded.to_string(), "embedded");
        assert!(PipelineState::Persisted.is_terminal());
        assert!(PipelineState::Aborted.is_terminal());
        assert!(!PipelineState::Fetched.is_terminal());
    }
}

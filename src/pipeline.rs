//! Pipeline orchestration.
//!
//! [`Pipeline`] wires the stages together and exposes the operations the
//! CLI (or any embedding caller) consumes: plan a goal, run the full
//! research pipeline, drive a refinement session, search the index, and
//! read corpus stats. The pipeline is generic over its [`Embedder`] and
//! [`VectorIndex`], so tests run it against stub embedders and the
//! in-memory index.
//!
//! Failure policy: adapter failures become report annotations, failed
//! embedding batches drop their chunks, and only index errors or an
//! invalid goal abort a run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapter::AdapterRegistry;
use crate::collector::collect;
use crate::config::Config;
use crate::embedding::{embed_query, Embedder};
use crate::error::PipelineError;
use crate::index::{QueryFilter, VectorIndex};
use crate::models::{
    Document, DocumentKey, Report, ResearchGoal, RetrievalResult, SourceFailure,
};
use crate::planner::{self, SubtopicPlan};
use crate::processor::process_documents;
use crate::refine::Session;
use crate::report::{synthesize, ExtractiveSummarizer, Summarizer};
use crate::retriever::retrieve_for_subtopic;

/// Minimum goal length accepted at the pipeline boundary.
const MIN_GOAL_CHARS: usize = 3;

pub struct Pipeline {
    config: Config,
    registry: AdapterRegistry,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    summarizer: Box<dyn Summarizer>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit parts.
    pub fn new(
        config: Config,
        registry: AdapterRegistry,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        let summarizer = Box::new(ExtractiveSummarizer {
            sentences_per_chunk: config.report.sentences_per_chunk,
        });
        Self {
            config,
            registry,
            embedder,
            index,
            summarizer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Expand a goal into the subtopic plan without touching the network.
    pub fn plan(&self, goal: &str) -> Result<SubtopicPlan, PipelineError> {
        let goal = validate_goal(goal)?;
        Ok(planner::plan(&goal))
    }

    /// The clarifying questions a refinement session would ask for `goal`.
    pub fn generate_questions(&self, goal: &str) -> Result<Vec<String>, PipelineError> {
        let goal = validate_goal(goal)?;
        Ok(crate::refine::clarifying_questions(&planner::normalize_goal(
            &goal,
        )))
    }

    /// Run the full pipeline: plan, collect, process, index, retrieve,
    /// synthesize.
    ///
    /// Cancellation is honored at subtopic granularity during collection;
    /// subtopics already collected still flow into a partial report.
    pub async fn run(
        &self,
        goal: &ResearchGoal,
        cancel: &CancellationToken,
    ) -> Result<Report, PipelineError> {
        validate_goal(&goal.text)?;
        let plan = planner::plan(&goal.text);
        info!(goal = %plan.goal, subtopics = plan.subtopics.len(), "pipeline run started");

        let (documents, failures) = self.ingest_plan(&plan, cancel).await?;

        // Retrieve evidence for every planned subtopic, collected or not;
        // earlier runs may already have indexed relevant chunks.
        let mut evidence = Vec::with_capacity(plan.subtopics.len());
        for subtopic in &plan.subtopics {
            let results = retrieve_for_subtopic(
                self.embedder.as_ref(),
                self.index.as_ref(),
                &self.registry,
                &self.config.retrieval,
                subtopic,
            )
            .await?;
            evidence.push(results);
        }

        let stats = self.index.stats().await?;
        let report = synthesize(
            goal,
            &plan,
            &evidence,
            &documents,
            stats,
            failures,
            self.summarizer.as_ref(),
            &self.config.report,
        );

        info!(
            sections = report.sections.len(),
            gaps = report.sections.iter().filter(|s| s.is_gap).count(),
            citations = report.citations.len(),
            failures = report.failures.len(),
            "pipeline run finished"
        );
        Ok(report)
    }

    /// Collect, process, and index documents for a goal without
    /// synthesizing a report. Returns the corpus stats afterwards.
    ///
    /// Used by `rsch search` and `rsch stats`, which need a populated
    /// index in the same invocation.
    pub async fn ingest(
        &self,
        goal: &str,
        cancel: &CancellationToken,
    ) -> Result<crate::models::CorpusStats, PipelineError> {
        let goal = validate_goal(goal)?;
        let plan = planner::plan(&goal);
        self.ingest_plan(&plan, cancel).await?;
        self.stats().await
    }

    /// Collect documents for every subtopic, process them, and upsert the
    /// resulting chunks. Returns the pooled documents and recorded
    /// failures.
    async fn ingest_plan(
        &self,
        plan: &SubtopicPlan,
        cancel: &CancellationToken,
    ) -> Result<(HashMap<DocumentKey, Document>, Vec<SourceFailure>), PipelineError> {
        let harvests = collect(
            &self.registry,
            plan,
            self.config.sources.max_results_per_source,
            cancel,
        )
        .await;

        // Pool documents across subtopics for citation resolution and
        // theme mining.
        let mut documents: HashMap<DocumentKey, Document> = HashMap::new();
        let mut failures: Vec<SourceFailure> = Vec::new();
        for harvest in &harvests {
            for doc in &harvest.documents {
                documents.entry(doc.key()).or_insert_with(|| doc.clone());
            }
            failures.extend(harvest.failures.iter().cloned());
        }

        // Process and upsert per subtopic. A document harvested under
        // several subtopics is chunked and embedded only once, tagged with
        // the first subtopic that found it; later subtopics reach it
        // through the retriever's global fallback. Index errors are fatal.
        let mut processed: HashSet<DocumentKey> = HashSet::new();
        for harvest in &harvests {
            let fresh: Vec<Document> = harvest
                .documents
                .iter()
                .filter(|doc| processed.insert(doc.key()))
                .cloned()
                .collect();
            if fresh.is_empty() {
                continue;
            }
            let outcome = process_documents(
                self.embedder.as_ref(),
                &self.config.chunking,
                self.config.embedding.batch_size,
                &fresh,
                &harvest.subtopic.name,
            )
            .await;
            if !outcome.chunks.is_empty() {
                self.index.upsert(outcome.chunks).await?;
            }
        }

        Ok((documents, failures))
    }

    /// Run the pipeline on a goal refined through a question/answer round.
    ///
    /// Convenience for non-interactive callers: builds the same refined
    /// goal an interactive [`Session`] would, then runs it.
    pub async fn run_refined(
        &self,
        original_goal: &str,
        answers: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Report, PipelineError> {
        let mut session = Session::new();
        session.submit_goal(original_goal)?;
        let refined = session.submit_answers(answers)?;
        self.run(&refined, cancel).await
    }

    /// Ad-hoc nearest-neighbor search over everything indexed so far.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>, PipelineError> {
        let embedding = embed_query(self.embedder.as_ref(), query).await?;
        let hits = self
            .index
            .query(&embedding, max_results, &QueryFilter::default())
            .await?;
        Ok(hits
            .into_iter()
            .map(|hit| RetrievalResult {
                subtopic: hit.chunk.metadata.subtopic.clone(),
                chunk: hit.chunk,
                distance: hit.distance,
            })
            .collect())
    }

    /// Aggregate corpus statistics from the index.
    pub async fn stats(&self) -> Result<crate::models::CorpusStats, PipelineError> {
        Ok(self.index.stats().await?)
    }
}

fn validate_goal(goal: &str) -> Result<String, PipelineError> {
    let trimmed = goal.trim();
    if trimmed.len() < MIN_GOAL_CHARS {
        return Err(PipelineError::InvalidGoal(format!(
            "research goal must be at least {} characters",
            MIN_GOAL_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SourceAdapter;
    use crate::error::{EmbeddingError, SourceError};
    use crate::index::MemoryIndex;
    use async_trait::async_trait;

    struct HashEmbedder;

    // Deterministic 4-dim embedding from text bytes; good enough to make
    // distances stable in tests.
    #[async_trait]
    impl Embedder for HashEmbedder {
        fn model_name(&self) -> &str {
            "hash"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = [0.0f32; 4];
                    for (i, b) in t.bytes().enumerate() {
                        v[i % 4] += b as f32 / 255.0;
                    }
                    v.to_vec()
                })
                .collect())
        }
    }

    struct StaticAdapter {
        id: &'static str,
        docs: Vec<Document>,
    }

    #[async_trait]
    impl SourceAdapter for StaticAdapter {
        fn source_id(&self) -> &str {
            self.id
        }
        fn description(&self) -> &str {
            "static"
        }
        async fn search(
            &self,
            _query: &str,
            max_results: usize,
        ) -> Result<Vec<Document>, SourceError> {
            Ok(self.docs.iter().take(max_results).cloned().collect())
        }
    }

    fn doc(source: &str, id: &str, title: &str) -> Document {
        Document {
            source: source.to_string(),
            external_id: id.to_string(),
            title: title.to_string(),
            authors: vec!["A. Author".to_string()],
            year: Some(2024),
            abstract_text: format!("{} is discussed in depth. Results follow.", title),
            url: None,
            raw_text: String::new(),
        }
    }

    fn pipeline_with(adapters: Vec<StaticAdapter>) -> Pipeline {
        let mut config = Config::default();
        config.sources.min_request_interval_ms = 0;
        config.sources.priority = adapters.iter().map(|a| a.id.to_string()).collect();

        let mut registry = AdapterRegistry::new(&config.sources);
        for adapter in adapters {
            registry.register(Box::new(adapter), &config.sources);
        }

        Pipeline::new(
            config,
            registry,
            Arc::new(HashEmbedder),
            Arc::new(MemoryIndex::new()),
        )
    }

    #[tokio::test]
    async fn test_run_produces_full_report() {
        let pipeline = pipeline_with(vec![StaticAdapter {
            id: "alpha",
            docs: vec![doc("alpha", "1", "Pheromone Routing"), doc("alpha", "2", "Swarm Convergence")],
        }]);

        let goal = ResearchGoal::new("ant colony optimization");
        let report = pipeline
            .run(&goal, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.sections.len(), 8);
        assert!(report.stats.unique_documents >= 2);
        assert!(!report.citations.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_short_goal() {
        let pipeline = pipeline_with(vec![]);
        let err = pipeline
            .run(&ResearchGoal::new("  x "), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGoal(_)));
    }

    #[tokio::test]
    async fn test_empty_registry_yields_all_gap_report() {
        let pipeline = pipeline_with(vec![]);
        let report = pipeline
            .run(
                &ResearchGoal::new("ant colony optimization"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(report.sections.iter().all(|s| s.is_gap));
        assert_eq!(report.stats.total_chunks, 0);
    }

    #[tokio::test]
    async fn test_search_returns_indexed_chunks() {
        let pipeline = pipeline_with(vec![StaticAdapter {
            id: "alpha",
            docs: vec![doc("alpha", "1", "Pheromone Routing")],
        }]);

        pipeline
            .run(
                &ResearchGoal::new("ant colony optimization"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let hits = pipeline.search("pheromone routing", 5).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits.len() <= 5);
    }

    #[tokio::test]
    async fn test_document_shared_across_subtopics_embedded_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingEmbedder {
            texts: AtomicUsize,
        }

        #[async_trait]
        impl Embedder for CountingEmbedder {
            fn model_name(&self) -> &str {
                "counting"
            }
            fn dims(&self) -> usize {
                2
            }
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
                self.texts.fetch_add(texts.len(), Ordering::SeqCst);
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
        }

        let mut config = Config::default();
        config.sources.min_request_interval_ms = 0;
        config.sources.priority = vec!["alpha".to_string()];
        let mut registry = AdapterRegistry::new(&config.sources);
        registry.register(
            Box::new(StaticAdapter {
                id: "alpha",
                docs: vec![doc("alpha", "1", "Pheromone Routing")],
            }),
            &config.sources,
        );

        let embedder = Arc::new(CountingEmbedder {
            texts: AtomicUsize::new(0),
        });
        let pipeline = Pipeline::new(
            config,
            registry,
            embedder.clone(),
            Arc::new(MemoryIndex::new()),
        );

        let report = pipeline
            .run(
                &ResearchGoal::new("ant colony optimization"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // The adapter returns the same document for every subtopic's
        // queries; it fits in one chunk and must be embedded exactly once,
        // plus one query embedding per subtopic during retrieval.
        assert_eq!(report.stats.total_chunks, 1);
        assert_eq!(
            embedder.texts.load(Ordering::SeqCst),
            1 + report.sections.len()
        );
    }

    #[tokio::test]
    async fn test_ingest_populates_index_without_report() {
        let pipeline = pipeline_with(vec![StaticAdapter {
            id: "alpha",
            docs: vec![doc("alpha", "1", "Pheromone Routing")],
        }]);

        let stats = pipeline
            .ingest("ant colony optimization", &CancellationToken::new())
            .await
            .unwrap();
        assert!(stats.total_chunks > 0);
        assert_eq!(stats.unique_documents, 1);
    }

    #[test]
    fn test_plan_and_questions() {
        let pipeline = pipeline_with(vec![]);
        let plan = pipeline.plan("swarm robotics").unwrap();
        assert_eq!(plan.subtopics.len(), 8);

        let questions = pipeline.generate_questions("swarm robotics").unwrap();
        assert_eq!(questions.len(), crate::refine::QUESTION_COUNT);

        assert!(pipeline.plan(" ").is_err());
    }
}

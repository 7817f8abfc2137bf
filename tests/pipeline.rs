//! End-to-end pipeline scenarios against stub sources and a deterministic
//! embedder. No network, no API key.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use research_harness::adapter::{AdapterRegistry, SourceAdapter};
use research_harness::collector::deduplicate;
use research_harness::config::Config;
use research_harness::embedding::Embedder;
use research_harness::error::{EmbeddingError, SourceError};
use research_harness::index::MemoryIndex;
use research_harness::models::{Document, ResearchGoal};
use research_harness::pipeline::Pipeline;
use research_harness::planner;
use research_harness::report::{render_markdown, GAP_NARRATIVE};

// ============ Test fixtures ============

/// Deterministic embedder: folds text bytes into an 8-dim vector.
struct ByteEmbedder;

#[async_trait]
impl Embedder for ByteEmbedder {
    fn model_name(&self) -> &str {
        "byte-fold"
    }
    fn dims(&self) -> usize {
        8
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = [0.0f32; 8];
                for (i, b) in t.bytes().enumerate() {
                    v[i % 8] += b as f32 / 255.0;
                }
                v.to_vec()
            })
            .collect())
    }
}

struct StubSource {
    id: &'static str,
    docs: Vec<Document>,
    fail: bool,
}

#[async_trait]
impl SourceAdapter for StubSource {
    fn source_id(&self) -> &str {
        self.id
    }
    fn description(&self) -> &str {
        "stub source"
    }
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<Document>, SourceError> {
        if self.fail {
            return Err(SourceError::Unavailable("connection refused".to_string()));
        }
        Ok(self.docs.iter().take(max_results).cloned().collect())
    }
}

fn doc(source: &str, id: &str, title: &str, year: i32) -> Document {
    Document {
        source: source.to_string(),
        external_id: id.to_string(),
        title: title.to_string(),
        authors: vec!["R. Researcher".to_string()],
        year: Some(year),
        abstract_text: format!(
            "{} explores convergence and pheromone dynamics. Experiments show robust behavior \
             under packet loss. The method generalizes across network topologies.",
            title
        ),
        url: Some(format!("https://example.org/{}/{}", source, id)),
        raw_text: String::new(),
    }
}

fn pipeline_with(sources: Vec<StubSource>) -> Pipeline {
    let mut config = Config::default();
    config.sources.min_request_interval_ms = 0;
    config.sources.adapter_timeout_secs = 5;
    config.sources.priority = sources.iter().map(|s| s.id.to_string()).collect();

    let mut registry = AdapterRegistry::new(&config.sources);
    for source in sources {
        registry.register(Box::new(source), &config.sources);
    }

    Pipeline::new(
        config,
        registry,
        Arc::new(ByteEmbedder),
        Arc::new(MemoryIndex::new()),
    )
}

// ============ Scenarios ============

#[test]
fn plan_always_emits_the_canonical_checklist() {
    let goals = [
        "ant colony optimization for routing",
        "protein folding",
        "x",
        "the latest developments",
    ];
    let reference: Vec<String> = planner::plan("reference goal")
        .subtopics
        .into_iter()
        .map(|s| s.name)
        .collect();

    for goal in goals {
        let names: Vec<String> = planner::plan(goal)
            .subtopics
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, reference, "plan for {:?} diverged", goal);
    }
}

#[test]
fn dedup_is_idempotent_and_order_preserving() {
    let pooled = vec![
        doc("arxiv", "1", "Ant Colony Routing", 2022),
        doc("semantic_scholar", "x9", "ant colony routing!", 2022),
        doc("arxiv", "2", "Swarm Convergence", 2023),
        doc("arxiv", "2", "Swarm Convergence", 2023),
    ];

    let once = deduplicate(pooled);
    assert_eq!(once.len(), 2);
    assert_eq!(once[0].source, "arxiv");
    assert_eq!(once[0].external_id, "1");

    let twice = deduplicate(once.clone());
    assert_eq!(
        once.iter().map(|d| d.key()).collect::<Vec<_>>(),
        twice.iter().map(|d| d.key()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn full_run_produces_cited_report() {
    // Two sources, three docs each, one title shared across sources.
    let pipeline = pipeline_with(vec![
        StubSource {
            id: "arxiv",
            docs: vec![
                doc("arxiv", "a1", "Pheromone Trails in Packet Routing", 2023),
                doc("arxiv", "a2", "Convergence of Ant Colony Methods", 2022),
                doc("arxiv", "a3", "Stigmergy for Network Control", 2024),
            ],
            fail: false,
        },
        StubSource {
            id: "semantic_scholar",
            docs: vec![
                doc("semantic_scholar", "s1", "Adaptive Routing Benchmarks", 2021),
                doc("semantic_scholar", "s2", "Pheromone trails in packet routing", 2023),
                doc("semantic_scholar", "s3", "Swarm Metrics Survey", 2020),
            ],
            fail: false,
        },
    ]);

    let report = pipeline
        .run(
            &ResearchGoal::new("ant colony optimization for routing"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // The shared title dedups down to five unique documents.
    assert_eq!(report.stats.unique_documents, 5);
    assert!(report.stats.total_chunks >= 5);
    assert_eq!(report.sections.len(), 8);
    assert!(report.failures.is_empty());

    // Every unique document ends up cited, numbered from 1 with no holes.
    assert_eq!(report.citations.len(), 5);
    for (i, citation) in report.citations.iter().enumerate() {
        assert_eq!(citation.index, i + 1);
    }
    // The deduped copy of the shared title kept the priority source.
    assert!(report
        .citations
        .iter()
        .filter(|c| c.document.title.to_lowercase() == "pheromone trails in packet routing")
        .all(|c| c.document.source == "arxiv"));

    let markdown = render_markdown(&report);
    assert!(markdown.contains("## References"));
    assert!(markdown.contains("## Executive Summary"));
}

#[tokio::test]
async fn refined_goal_carries_answers_into_the_report() {
    let pipeline = pipeline_with(vec![StubSource {
        id: "arxiv",
        docs: vec![doc("arxiv", "a1", "Pheromone Trails", 2023)],
        fail: false,
    }]);

    let report = pipeline
        .run_refined(
            "ant colony optimization",
            vec![
                "routing protocols".to_string(),
                "telecom networks".to_string(),
                "recent work".to_string(),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let goal = &report.goal;
    assert_eq!(goal.original.as_deref(), Some("Ant colony optimization"));
    assert_eq!(goal.qa_pairs.len(), 3);
    assert!(goal.text.contains("Ant colony optimization"));
    assert!(goal.text.contains("routing protocols"));
    assert!(goal.text.contains("telecom networks"));
    assert!(goal.text.contains("recent work"));
}

#[tokio::test]
async fn failed_source_is_annotated_not_fatal() {
    let pipeline = pipeline_with(vec![
        StubSource {
            id: "arxiv",
            docs: vec![doc("arxiv", "a1", "Pheromone Trails", 2023)],
            fail: false,
        },
        StubSource {
            id: "semantic_scholar",
            docs: vec![],
            fail: true,
        },
        StubSource {
            id: "wikipedia",
            docs: vec![doc("wikipedia", "w1", "Ant colony optimization", 2024)],
            fail: false,
        },
    ]);

    let report = pipeline
        .run(
            &ResearchGoal::new("ant colony optimization"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // The healthy sources still contributed.
    assert!(report.stats.unique_documents >= 2);
    // Every subtopic records the failing source against each of its queries.
    assert!(!report.failures.is_empty());
    assert!(report
        .failures
        .iter()
        .all(|f| f.source == "semantic_scholar"));
    assert!(report.failures.iter().any(|f| f.error.contains("connection refused")));

    let markdown = render_markdown(&report);
    assert!(markdown.contains("## Collection Notes"));
}

#[tokio::test]
async fn empty_corpus_yields_all_gap_report() {
    let pipeline = pipeline_with(vec![StubSource {
        id: "arxiv",
        docs: vec![],
        fail: false,
    }]);

    let report = pipeline
        .run(
            &ResearchGoal::new("an exceedingly obscure topic"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.stats.total_chunks, 0);
    assert!(report.citations.is_empty());
    assert_eq!(report.sections.len(), 8);
    for section in &report.sections {
        assert!(section.is_gap);
        assert_eq!(section.narrative, GAP_NARRATIVE);
        assert!(section.citation_indices.is_empty());
    }

    // The rendered report still stands on its own.
    let markdown = render_markdown(&report);
    assert!(markdown.contains(GAP_NARRATIVE));
    assert!(!markdown.contains("## References"));
}

#[tokio::test]
async fn cancelled_run_still_reports_completed_subtopics() {
    let pipeline = pipeline_with(vec![StubSource {
        id: "arxiv",
        docs: vec![doc("arxiv", "a1", "Pheromone Trails", 2023)],
        fail: false,
    }]);

    let cancel = CancellationToken::new();
    cancel.cancel();

    // Cancelled before any subtopic starts: nothing collected, but the
    // run completes with a full set of gap sections.
    let report = pipeline
        .run(&ResearchGoal::new("ant colony optimization"), &cancel)
        .await
        .unwrap();
    assert_eq!(report.sections.len(), 8);
    assert_eq!(report.stats.total_chunks, 0);
}

#[tokio::test]
async fn search_finds_relevant_chunk_in_goal_corpus() {
    let pipeline = pipeline_with(vec![StubSource {
        id: "arxiv",
        docs: vec![
            doc("arxiv", "a1", "Pheromone Trails in Packet Routing", 2023),
            doc("arxiv", "a2", "Unrelated Gardening Notes", 2019),
        ],
        fail: false,
    }]);

    pipeline
        .ingest("ant colony optimization", &CancellationToken::new())
        .await
        .unwrap();

    let results = pipeline.search("pheromone trails", 3).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 3);
    // Distances come back sorted ascending.
    for pair in results.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

//! Source adapter trait and registry.
//!
//! A [`SourceAdapter`] fetches raw documents for a query from one external
//! source (arXiv, Semantic Scholar, Wikipedia, ...). Adapters normalize
//! their own schema into the fixed [`Document`] shape; the rest of the
//! pipeline is polymorphic over this single `search` capability.
//!
//! The [`AdapterRegistry`] holds adapters in source-priority order and
//! wraps each in an [`AdapterHandle`] that enforces the adapter's minimum
//! inter-request interval and per-call timeout. Calls through one handle
//! are serialized; calls across handles run in parallel.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::{Config, SourcesConfig};
use crate::error::SourceError;
use crate::models::Document;

/// A data source that produces documents for a search query.
///
/// # Contract
///
/// `search` must return fully-parsed, validated documents — never partial
/// or malformed ones. Parse failures on individual entries are the
/// adapter's to skip; transport-level failures map to [`SourceError`].
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable source identifier (e.g. `"arxiv"`). Used as the first half
    /// of every document identity key and in the priority order.
    fn source_id(&self) -> &str;

    /// One-line description, shown by `rsch sources`.
    fn description(&self) -> &str;

    /// Fetch up to `max_results` documents matching `query`.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<Document>, SourceError>;
}

/// A registered adapter plus its pacing and timeout state.
pub struct AdapterHandle {
    adapter: Box<dyn SourceAdapter>,
    /// Completion time of the most recent request. Holding this lock across
    /// the request is what serializes calls to one source.
    pacer: Mutex<Option<Instant>>,
    min_interval: Duration,
    timeout: Duration,
}

impl AdapterHandle {
    pub fn source_id(&self) -> &str {
        self.adapter.source_id()
    }

    pub fn description(&self) -> &str {
        self.adapter.description()
    }

    /// Rate-limited, timeout-guarded search.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Document>, SourceError> {
        let mut last = self.pacer.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        let result = match tokio::time::timeout(
            self.timeout,
            self.adapter.search(query, max_results),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.timeout)),
        };

        *last = Some(Instant::now());
        result
    }
}

/// Registry of source adapters in priority order.
pub struct AdapterRegistry {
    handles: Vec<Arc<AdapterHandle>>,
    priority: Vec<String>,
}

impl AdapterRegistry {
    pub fn new(sources: &SourcesConfig) -> Self {
        Self {
            handles: Vec::new(),
            priority: sources.priority.clone(),
        }
    }

    /// Create a registry pre-loaded with the built-in adapters, ordered by
    /// `sources.priority`.
    pub fn from_config(config: &Config) -> Self {
        use crate::adapter_arxiv::ArxivAdapter;
        use crate::adapter_semantic_scholar::SemanticScholarAdapter;
        use crate::adapter_wikipedia::WikipediaAdapter;

        let mut registry = Self::new(&config.sources);

        for source in &config.sources.priority {
            match source.as_str() {
                "arxiv" => registry.register(Box::new(ArxivAdapter::new()), &config.sources),
                "semantic_scholar" => {
                    registry.register(Box::new(SemanticScholarAdapter::new()), &config.sources)
                }
                "wikipedia" => {
                    registry.register(Box::new(WikipediaAdapter::new()), &config.sources)
                }
                other => tracing::warn!(source = other, "unknown source in priority list, skipped"),
            }
        }

        registry
    }

    /// Register an adapter with the shared pacing/timeout settings.
    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>, sources: &SourcesConfig) {
        self.handles.push(Arc::new(AdapterHandle {
            adapter,
            pacer: Mutex::new(None),
            min_interval: Duration::from_millis(sources.min_request_interval_ms),
            timeout: Duration::from_secs(sources.adapter_timeout_secs),
        }));
    }

    /// All registered adapters, in priority order.
    pub fn handles(&self) -> &[Arc<AdapterHandle>] {
        &self.handles
    }

    /// Rank of a source in the configured priority order; unknown sources
    /// sort last.
    pub fn priority_rank(&self, source: &str) -> usize {
        self.priority
            .iter()
            .position(|s| s == source)
            .unwrap_or(self.priority.len())
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }
}

//! Document collection: fan-out, partial failure, dedup.
//!
//! For each subtopic the collector runs every query against every adapter.
//! Adapters run in parallel (each behind its pacing handle, so calls to one
//! source stay serialized) and every call carries its own timeout. A failed
//! call is recorded as a [`SourceFailure`] annotation on the subtopic and
//! never aborts the subtopic or the run.
//!
//! Pooled results are deduplicated first by identity key, then by a
//! normalized-title fingerprint that catches the same paper indexed under
//! two source IDs. The pool is iterated in source-priority order, so the
//! priority source wins ties and document order after dedup follows
//! priority-then-fetch-order.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::{AdapterHandle, AdapterRegistry};
use crate::models::{Document, DocumentKey, SourceFailure};
use crate::planner::{Subtopic, SubtopicPlan};

/// Everything collected for one subtopic.
#[derive(Debug, Clone)]
pub struct SubtopicHarvest {
    pub subtopic: Subtopic,
    pub documents: Vec<Document>,
    pub failures: Vec<SourceFailure>,
}

/// Collect documents for every subtopic in the plan, in plan order.
///
/// Cancellation is cooperative at subtopic granularity: once the token is
/// cancelled no further subtopics are started, but harvests already
/// completed are returned so they can still contribute to a partial report.
pub async fn collect(
    registry: &AdapterRegistry,
    plan: &SubtopicPlan,
    max_results: usize,
    cancel: &CancellationToken,
) -> Vec<SubtopicHarvest> {
    let mut harvests = Vec::with_capacity(plan.subtopics.len());

    for subtopic in &plan.subtopics {
        if cancel.is_cancelled() {
            warn!(
                subtopic = %subtopic.name,
                collected = harvests.len(),
                "collection cancelled, continuing with completed subtopics"
            );
            break;
        }
        harvests.push(collect_subtopic(registry, subtopic, max_results).await);
    }

    harvests
}

/// Collect and deduplicate documents for a single subtopic.
pub async fn collect_subtopic(
    registry: &AdapterRegistry,
    subtopic: &Subtopic,
    max_results: usize,
) -> SubtopicHarvest {
    // One task per adapter; each task walks the subtopic's queries in
    // order, which serializes requests to that source.
    let tasks = registry.handles().iter().map(|handle| {
        let handle = Arc::clone(handle);
        let queries = subtopic.queries.clone();
        let subtopic_name = subtopic.name.clone();
        async move { harvest_adapter(handle, &subtopic_name, &queries, max_results).await }
    });

    let per_adapter = join_all(tasks).await;

    // Pool in registry (priority) order, then dedup first-seen-wins.
    let mut pooled = Vec::new();
    let mut failures = Vec::new();
    for (documents, adapter_failures) in per_adapter {
        pooled.extend(documents);
        failures.extend(adapter_failures);
    }

    let documents = deduplicate(pooled);

    debug!(
        subtopic = %subtopic.name,
        documents = documents.len(),
        failures = failures.len(),
        "subtopic collected"
    );

    SubtopicHarvest {
        subtopic: subtopic.clone(),
        documents,
        failures,
    }
}

async fn harvest_adapter(
    handle: Arc<AdapterHandle>,
    subtopic: &str,
    queries: &[String],
    max_results: usize,
) -> (Vec<Document>, Vec<SourceFailure>) {
    let mut documents = Vec::new();
    let mut failures = Vec::new();

    for query in queries {
        match handle.search(query, max_results).await {
            Ok(batch) => documents.extend(batch),
            Err(err) => {
                warn!(
                    source = handle.source_id(),
                    subtopic,
                    query = query.as_str(),
                    error = %err,
                    "adapter call failed, recorded as partial failure"
                );
                failures.push(SourceFailure {
                    subtopic: subtopic.to_string(),
                    source: handle.source_id().to_string(),
                    query: query.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    (documents, failures)
}

/// Drop duplicates, keeping the first-seen document.
///
/// Two documents are duplicates when they share an identity key or a
/// normalized-title fingerprint.
pub fn deduplicate(pooled: Vec<Document>) -> Vec<Document> {
    let mut seen_keys: HashSet<DocumentKey> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(pooled.len());

    for doc in pooled {
        if !seen_keys.insert(doc.key()) {
            continue;
        }
        let fingerprint = title_fingerprint(&doc.title);
        if !fingerprint.is_empty() && !seen_titles.insert(fingerprint) {
            continue;
        }
        unique.push(doc);
    }

    unique
}

/// Lower-cased, punctuation-stripped, whitespace-collapsed title.
pub fn title_fingerprint(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

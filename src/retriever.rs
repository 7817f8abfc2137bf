//! Per-subtopic evidence retrieval.
//!
//! Embeds the subtopic's canonical description, queries the vector index
//! restricted to chunks tagged with that subtopic (falling back to a
//! global query when the tag matches nothing), and filters out anything
//! beyond the configured maximum distance. An emptied result set means the
//! subtopic is a research gap — the synthesizer marks it, the retriever
//! never pads it with low-relevance evidence.

use tracing::{debug, warn};

use crate::adapter::AdapterRegistry;
use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, Embedder};
use crate::error::IndexError;
use crate::index::{QueryFilter, ScoredChunk, VectorIndex};
use crate::models::RetrievalResult;
use crate::planner::Subtopic;

/// Candidate multiplier: fetch more than the cap so the distance threshold
/// has something to cut.
const CANDIDATE_FACTOR: usize = 4;

pub async fn retrieve_for_subtopic(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    registry: &AdapterRegistry,
    retrieval: &RetrievalConfig,
    subtopic: &Subtopic,
) -> Result<Vec<RetrievalResult>, IndexError> {
    let query_text = format!("{}. {}", subtopic.name, subtopic.description);

    let query_embedding = match embed_query(embedder, &query_text).await {
        Ok(embedding) => embedding,
        Err(err) => {
            // Recoverable: an unembeddable query yields a gap, not a
            // failed run.
            warn!(subtopic = %subtopic.name, error = %err, "query embedding failed");
            return Ok(Vec::new());
        }
    };

    let k = retrieval.per_subtopic_limit * CANDIDATE_FACTOR;

    let mut candidates = index
        .query(
            &query_embedding,
            k,
            &QueryFilter::for_subtopic(&subtopic.name),
        )
        .await?;

    // Nothing tagged with this subtopic: re-rank globally instead.
    if candidates.is_empty() {
        candidates = index
            .query(&query_embedding, k, &QueryFilter::default())
            .await?;
    }

    candidates.retain(|c| c.distance <= retrieval.max_distance);

    sort_candidates(&mut candidates, registry);
    candidates.truncate(retrieval.per_subtopic_limit);

    debug!(
        subtopic = %subtopic.name,
        results = candidates.len(),
        "retrieval complete"
    );

    Ok(candidates
        .into_iter()
        .map(|c| RetrievalResult {
            chunk: c.chunk,
            distance: c.distance,
            subtopic: subtopic.name.clone(),
        })
        .collect())
}

/// Distance ascending; ties by most-recent year, then source priority.
fn sort_candidates(candidates: &mut [ScoredChunk], registry: &AdapterRegistry) {
    candidates.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.chunk
                    .metadata
                    .year
                    .unwrap_or(i32::MIN)
                    .cmp(&a.chunk.metadata.year.unwrap_or(i32::MIN))
            })
            .then_with(|| {
                registry
                    .priority_rank(&a.chunk.metadata.source)
                    .cmp(&registry.priority_rank(&b.chunk.metadata.source))
            })
    });
}

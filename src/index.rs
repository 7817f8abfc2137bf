//! Vector index capability.
//!
//! The pipeline owns no persistence of its own: chunks live in whatever
//! backend implements [`VectorIndex`]. The contract is deliberately small —
//! idempotent keyed upsert, filtered nearest-neighbor query, aggregate
//! stats — and distance is an opaque non-negative score where smaller
//! means closer.
//!
//! [`MemoryIndex`] is the reference implementation used by the CLI and the
//! test suite: a `RwLock`-guarded map keyed on
//! `(document key, sequence_index)` with a brute-force cosine scan.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::embedding::cosine_distance;
use crate::error::IndexError;
use crate::models::{Chunk, CorpusStats, DocumentKey};

/// Metadata constraints applied during a query.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub subtopic: Option<String>,
    pub source: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
}

impl QueryFilter {
    pub fn for_subtopic(name: &str) -> Self {
        Self {
            subtopic: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(ref subtopic) = self.subtopic {
            if &chunk.metadata.subtopic != subtopic {
                return false;
            }
        }
        if let Some(ref source) = self.source {
            if &chunk.metadata.source != source {
                return false;
            }
        }
        if let Some(min) = self.year_min {
            if chunk.metadata.year.map_or(true, |y| y < min) {
                return false;
            }
        }
        if let Some(max) = self.year_max {
            if chunk.metadata.year.map_or(true, |y| y > max) {
                return false;
            }
        }
        true
    }
}

/// A chunk plus its distance to the query embedding.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// The persistent similarity store consumed by the pipeline.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace chunks keyed by `(document key, sequence_index)`.
    /// Re-upserting the same chunks leaves the index unchanged, which makes
    /// concurrent writers from separate runs safe.
    async fn upsert(&self, chunks: Vec<Chunk>) -> Result<(), IndexError>;

    /// Return the `k` nearest chunks to `embedding` that pass `filter`,
    /// ordered by ascending distance.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Aggregate counts by source and year.
    async fn stats(&self) -> Result<CorpusStats, IndexError>;
}

/// In-memory reference implementation of [`VectorIndex`].
#[derive(Default)]
pub struct MemoryIndex {
    chunks: RwLock<HashMap<(DocumentKey, usize), Chunk>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, chunks: Vec<Chunk>) -> Result<(), IndexError> {
        let mut map = self.chunks.write().await;
        for chunk in chunks {
            map.insert((chunk.document.clone(), chunk.sequence_index), chunk);
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let map = self.chunks.read().await;

        let mut scored: Vec<ScoredChunk> = map
            .values()
            .filter(|chunk| filter.matches(chunk))
            .map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                distance: cosine_distance(embedding, &chunk.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    (a.chunk.document.clone(), a.chunk.sequence_index)
                        .cmp(&(b.chunk.document.clone(), b.chunk.sequence_index))
                })
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn stats(&self) -> Result<CorpusStats, IndexError> {
        let map = self.chunks.read().await;

        let mut stats = CorpusStats {
            total_chunks: map.len(),
            ..Default::default()
        };

        let mut documents: std::collections::HashSet<&DocumentKey> =
            std::collections::HashSet::new();
        for chunk in map.values() {
            documents.insert(&chunk.document);
            *stats
                .per_source_counts
                .entry(chunk.metadata.source.clone())
                .or_insert(0) += 1;
            if let Some(year) = chunk.metadata.year {
                *stats.per_year_counts.entry(year).or_insert(0) += 1;
            }
        }
        stats.unique_documents = documents.len();

        Ok(stats)
    }
}

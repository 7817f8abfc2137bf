//! Core data models used throughout Research Harness.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the research pipeline, plus the final report structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A research goal, possibly refined through a question/answer session.
///
/// Immutable once a pipeline run starts: refinement produces a new value
/// (with `original` and `qa_pairs` populated) rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchGoal {
    /// The goal text the pipeline actually runs on.
    pub text: String,
    /// The goal as originally entered, if this goal is a refinement.
    pub original: Option<String>,
    /// Question/answer pairs folded into the refined text.
    pub qa_pairs: Vec<(String, String)>,
}

impl ResearchGoal {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            original: None,
            qa_pairs: Vec::new(),
        }
    }
}

/// Identity key of a document: `(source, external_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    pub source: String,
    pub external_id: String,
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.external_id)
    }
}

/// Normalized document produced by a source adapter.
///
/// Adapters are responsible for mapping their own schema into this one
/// fixed shape; nothing downstream ever sees source-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub abstract_text: String,
    pub url: Option<String>,
    /// Full body text where the source provides one; empty means
    /// "chunk the abstract instead".
    pub raw_text: String,
}

impl Document {
    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            source: self.source.clone(),
            external_id: self.external_id.clone(),
        }
    }

    /// Text the processor chunks: the raw body when present, otherwise
    /// title + abstract.
    pub fn chunkable_text(&self) -> String {
        if !self.raw_text.trim().is_empty() {
            self.raw_text.clone()
        } else if self.abstract_text.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, self.abstract_text)
        }
    }
}

/// Metadata carried on every chunk for filtering and citation rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub title: String,
    pub year: Option<i32>,
    /// The subtopic the owning document was collected under.
    pub subtopic: String,
}

/// A bounded text window from a document — the unit of embedding and
/// retrieval. Keyed by `(document key, sequence_index)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub document: DocumentKey,
    pub sequence_index: usize,
    pub text: String,
    /// SHA-256 of `text`, used for staleness detection on re-upsert.
    pub hash: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A single nearest-neighbor hit from the vector index.
///
/// Ephemeral: produced per retriever call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    /// Opaque non-negative score from the index; lower = more similar.
    pub distance: f32,
    pub subtopic: String,
}

/// Aggregate corpus statistics for a report or the index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_chunks: usize,
    pub unique_documents: usize,
    pub per_source_counts: BTreeMap<String, usize>,
    pub per_year_counts: BTreeMap<i32, usize>,
}

/// One rendered report section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSection {
    pub subtopic: String,
    pub description: String,
    pub narrative: String,
    /// Empty if and only if `is_gap` is true.
    pub supporting_chunks: Vec<RetrievalResult>,
    /// No qualifying evidence was found; the narrative is a gap marker.
    pub is_gap: bool,
    /// Citation numbers (1-based) of the documents backing this section.
    pub citation_indices: Vec<usize>,
}

/// A numbered citation, ordered by first appearance across the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub document: Document,
}

/// The final structured report for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub goal: ResearchGoal,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
    pub stats: CorpusStats,
    pub key_themes: Vec<String>,
    pub citations: Vec<Citation>,
    /// Per-subtopic adapter failures recorded during collection.
    pub failures: Vec<SourceFailure>,
}

/// A recorded (non-fatal) adapter failure during collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFailure {
    pub subtopic: String,
    pub source: String,
    pub query: String,
    pub error: String,
}

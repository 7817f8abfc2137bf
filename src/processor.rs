//! Document processing: chunking plus batched embedding.
//!
//! Documents are split into overlapping windows, tagged with their owning
//! subtopic, and embedded in batches to amortize call overhead. A failed
//! embedding batch drops only its own chunks — the drop is logged and
//! sibling batches continue.

use tracing::{debug, warn};

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::models::{Chunk, ChunkMetadata, Document};

/// Chunks ready for upsert, plus how many were dropped on embedding
/// failure.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub chunks: Vec<Chunk>,
    pub dropped: usize,
}

/// Chunk and embed a subtopic's documents.
pub async fn process_documents(
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
    batch_size: usize,
    documents: &[Document],
    subtopic: &str,
) -> ProcessOutcome {
    // Window every document first so batches can span documents.
    let mut pending: Vec<(Chunk, String)> = Vec::new();

    for doc in documents {
        let text = doc.chunkable_text();
        let windows = chunk_text(&text, chunking.window_chars, chunking.overlap_fraction);

        for window in windows {
            let chunk = Chunk {
                document: doc.key(),
                sequence_index: window.sequence_index,
                text: window.text.clone(),
                hash: window.hash,
                embedding: Vec::new(),
                metadata: ChunkMetadata {
                    source: doc.source.clone(),
                    title: doc.title.clone(),
                    year: doc.year,
                    subtopic: subtopic.to_string(),
                },
            };
            pending.push((chunk, window.text));
        }
    }

    let mut outcome = ProcessOutcome::default();
    let batch_size = batch_size.max(1);

    for batch in pending.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();

        match embedder.embed(&texts).await {
            Ok(embeddings) => {
                for ((chunk, _), embedding) in batch.iter().zip(embeddings) {
                    let mut chunk = chunk.clone();
                    chunk.embedding = embedding;
                    outcome.chunks.push(chunk);
                }
            }
            Err(err) => {
                warn!(
                    subtopic,
                    dropped = batch.len(),
                    error = %err,
                    "embedding batch failed, chunks dropped"
                );
                outcome.dropped += batch.len();
            }
        }
    }

    debug!(
        subtopic,
        chunks = outcome.chunks.len(),
        dropped = outcome.dropped,
        "documents processed"
    );

    outcome
}

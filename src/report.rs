//! Report synthesis: sections, themes, citations, markdown rendering.
//!
//! The synthesizer is deterministic and offline. It takes the plan, the
//! per-subtopic evidence the retriever produced, and the pooled documents,
//! and assembles a [`Report`]: one section per subtopic in plan order, key
//! themes mined from the document pool, and citations numbered by first
//! appearance. A subtopic with no qualifying evidence becomes an explicit
//! gap section rather than being silently dropped.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::config::ReportConfig;
use crate::models::{
    Citation, CorpusStats, Document, DocumentKey, Report, ReportSection, ResearchGoal,
    RetrievalResult, SourceFailure,
};
use crate::planner::{extract_keywords, SubtopicPlan};

/// Narrative used for a subtopic with no qualifying evidence.
pub const GAP_NARRATIVE: &str =
    "No supporting documents were found for this subtopic. This may indicate a research gap.";

const THEME_STOPWORDS: [&str; 32] = [
    "this", "that", "with", "from", "have", "been", "which", "their", "these", "those", "such",
    "also", "into", "other", "more", "most", "some", "than", "then", "when", "where", "while",
    "based", "using", "used", "between", "within", "paper", "study", "results", "approach",
    "method",
];

/// Turns retrieved evidence into a section narrative.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, description: &str, evidence: &[RetrievalResult]) -> String;
}

/// Deterministic extractive summarizer: leading sentences of each
/// supporting chunk, in retrieval order.
pub struct ExtractiveSummarizer {
    pub sentences_per_chunk: usize,
}

impl Summarizer for ExtractiveSummarizer {
    fn summarize(&self, description: &str, evidence: &[RetrievalResult]) -> String {
        let mut parts = vec![description.to_string()];
        for result in evidence {
            let lead = leading_sentences(&result.chunk.text, self.sentences_per_chunk.max(1));
            if !lead.is_empty() {
                parts.push(lead);
            }
        }
        parts.join(" ")
    }
}

/// First `n` sentences of `text`, whitespace-normalized.
fn leading_sentences(text: &str, n: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::new();
    let mut count = 0;
    for piece in normalized.split_inclusive(['.', '!', '?']) {
        out.push_str(piece);
        count += 1;
        if count >= n {
            break;
        }
    }
    out.trim().to_string()
}

/// Assemble the full report.
///
/// `evidence` must be aligned with `plan.subtopics` (one entry per
/// subtopic, in plan order). `documents` is the deduplicated pool keyed by
/// document identity, used to resolve citations and mine themes.
#[allow(clippy::too_many_arguments)]
pub fn synthesize(
    goal: &ResearchGoal,
    plan: &SubtopicPlan,
    evidence: &[Vec<RetrievalResult>],
    documents: &HashMap<DocumentKey, Document>,
    stats: CorpusStats,
    failures: Vec<SourceFailure>,
    summarizer: &dyn Summarizer,
    config: &ReportConfig,
) -> Report {
    let mut citations: Vec<Citation> = Vec::new();
    let mut citation_by_key: HashMap<DocumentKey, usize> = HashMap::new();
    let mut sections = Vec::with_capacity(plan.subtopics.len());

    for (subtopic, results) in plan.subtopics.iter().zip(evidence.iter()) {
        if results.is_empty() {
            sections.push(ReportSection {
                subtopic: subtopic.name.clone(),
                description: subtopic.description.clone(),
                narrative: GAP_NARRATIVE.to_string(),
                supporting_chunks: Vec::new(),
                is_gap: true,
                citation_indices: Vec::new(),
            });
            continue;
        }

        // Citation numbers are assigned on first appearance, walking
        // sections in plan order and evidence in retrieval order.
        let mut indices = Vec::new();
        for result in results {
            let key = result.chunk.document.clone();
            let index = *citation_by_key.entry(key.clone()).or_insert_with(|| {
                let index = citations.len() + 1;
                citations.push(Citation {
                    index,
                    document: documents.get(&key).cloned().unwrap_or_else(|| Document {
                        source: key.source.clone(),
                        external_id: key.external_id.clone(),
                        title: result.chunk.metadata.title.clone(),
                        authors: Vec::new(),
                        year: result.chunk.metadata.year,
                        abstract_text: String::new(),
                        url: None,
                        raw_text: String::new(),
                    }),
                });
                index
            });
            if !indices.contains(&index) {
                indices.push(index);
            }
        }

        sections.push(ReportSection {
            subtopic: subtopic.name.clone(),
            description: subtopic.description.clone(),
            narrative: summarizer.summarize(&subtopic.description, results),
            supporting_chunks: results.clone(),
            is_gap: false,
            citation_indices: indices,
        });
    }

    let key_themes = extract_key_themes(documents.values(), &plan.goal, config.top_themes);

    debug!(
        sections = sections.len(),
        gaps = sections.iter().filter(|s| s.is_gap).count(),
        citations = citations.len(),
        "report synthesized"
    );

    Report {
        goal: goal.clone(),
        generated_at: Utc::now(),
        sections,
        stats,
        key_themes,
        citations,
        failures,
    }
}

/// Frequent content words across document titles and abstracts.
///
/// Words under four characters, theme stopwords, and words already in the
/// goal are excluded; a word must appear at least twice to qualify.
pub fn extract_key_themes<'a>(
    documents: impl Iterator<Item = &'a Document>,
    goal: &str,
    top_n: usize,
) -> Vec<String> {
    let goal_words: Vec<String> = extract_keywords(goal);
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for doc in documents {
        let text = format!("{} {}", doc.title, doc.abstract_text).to_lowercase();
        let words = text
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>();
        for word in words.split_whitespace() {
            if word.len() < 4
                || THEME_STOPWORDS.contains(&word)
                || goal_words.iter().any(|g| g == word)
            {
                continue;
            }
            *counts.entry(word.to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> =
        counts.into_iter().filter(|(_, n)| *n >= 2).collect();
    // Frequency descending; the BTreeMap source makes equal-frequency
    // ordering alphabetical and stable.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(top_n).map(|(w, _)| w).collect()
}

// ============================================================
// Markdown rendering
// ============================================================

/// Render the report as a standalone markdown document.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Research Report: {}\n\n", report.goal.text));
    out.push_str(&format!(
        "*Generated {}*\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    if let Some(original) = &report.goal.original {
        out.push_str(&format!("*Refined from: {}*\n\n", original));
    }

    out.push_str("## Executive Summary\n\n");
    out.push_str(&format!(
        "This report covers {} subtopics, drawing on {} unique documents \
         ({} indexed chunks).\n\n",
        report.sections.len(),
        report.stats.unique_documents,
        report.stats.total_chunks
    ));

    if !report.key_themes.is_empty() {
        out.push_str(&format!(
            "**Key themes:** {}\n\n",
            report.key_themes.join(", ")
        ));
    }

    if !report.stats.per_source_counts.is_empty() {
        out.push_str("**Sources:** ");
        let parts: Vec<String> = report
            .stats
            .per_source_counts
            .iter()
            .map(|(source, count)| format!("{} ({} chunks)", source, count))
            .collect();
        out.push_str(&parts.join(", "));
        out.push_str("\n\n");
    }

    // BTreeMap keys come back sorted, so first/last give the span.
    if let (Some(earliest), Some(latest)) = (
        report.stats.per_year_counts.keys().next(),
        report.stats.per_year_counts.keys().next_back(),
    ) {
        if earliest == latest {
            out.push_str(&format!("**Publication years:** {}\n\n", earliest));
        } else {
            out.push_str(&format!(
                "**Publication years:** {}-{}\n\n",
                earliest, latest
            ));
        }
    }

    for section in &report.sections {
        out.push_str(&format!("## {}\n\n", section.subtopic));
        out.push_str(&format!("{}\n\n", section.narrative));
        if !section.citation_indices.is_empty() {
            let refs: Vec<String> = section
                .citation_indices
                .iter()
                .map(|i| format!("[{}]", i))
                .collect();
            out.push_str(&format!("*Sources: {}*\n\n", refs.join(" ")));
        }
    }

    if !report.failures.is_empty() {
        out.push_str("## Collection Notes\n\n");
        for failure in &report.failures {
            out.push_str(&format!(
                "- `{}` failed for \"{}\" ({}): {}\n",
                failure.source, failure.query, failure.subtopic, failure.error
            ));
        }
        out.push('\n');
    }

    if !report.citations.is_empty() {
        out.push_str("## References\n\n");
        for citation in &report.citations {
            out.push_str(&format!(
                "{}. {}\n",
                citation.index,
                format_citation(&citation.document)
            ));
        }
    }

    out
}

/// `Authors (Year). Title. URL` with et-al collapsing past three authors.
fn format_citation(doc: &Document) -> String {
    let authors = format_authors(&doc.authors);
    let year = doc
        .year
        .map(|y| format!(" ({})", y))
        .unwrap_or_default();
    let url = doc
        .url
        .as_deref()
        .map(|u| format!(" {}", u))
        .unwrap_or_default();
    if authors.is_empty() {
        format!("{}{}.{}", doc.title, year, url)
    } else {
        format!("{}{}. {}.{}", authors, year, doc.title, url)
    }
}

fn format_authors(authors: &[String]) -> String {
    match authors.len() {
        0 => String::new(),
        1 => authors[0].clone(),
        2 => format!("{} & {}", authors[0], authors[1]),
        3 => format!("{}, {} & {}", authors[0], authors[1], authors[2]),
        _ => format!("{} et al.", authors[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMetadata};
    use crate::planner::plan;

    fn doc(source: &str, id: &str, title: &str, abstract_text: &str) -> Document {
        Document {
            source: source.to_string(),
            external_id: id.to_string(),
            title: title.to_string(),
            authors: vec!["Ada Lovelace".to_string()],
            year: Some(2024),
            abstract_text: abstract_text.to_string(),
            url: Some(format!("https://example.org/{}", id)),
            raw_text: String::new(),
        }
    }

    fn result(source: &str, id: &str, subtopic: &str, text: &str) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                document: DocumentKey {
                    source: source.to_string(),
                    external_id: id.to_string(),
                },
                sequence_index: 0,
                text: text.to_string(),
                hash: "h".to_string(),
                embedding: vec![],
                metadata: ChunkMetadata {
                    source: source.to_string(),
                    title: format!("Title {}", id),
                    year: Some(2024),
                    subtopic: subtopic.to_string(),
                },
            },
            distance: 0.1,
            subtopic: subtopic.to_string(),
        }
    }

    fn pool(docs: Vec<Document>) -> HashMap<DocumentKey, Document> {
        docs.into_iter().map(|d| (d.key(), d)).collect()
    }

    fn config() -> ReportConfig {
        ReportConfig {
            top_themes: 10,
            sentences_per_chunk: 2,
        }
    }

    #[test]
    fn test_leading_sentences() {
        let text = "First sentence. Second one! Third? Fourth.";
        assert_eq!(leading_sentences(text, 2), "First sentence. Second one!");
        assert_eq!(leading_sentences("no terminator here", 2), "no terminator here");
    }

    #[test]
    fn test_citations_numbered_by_first_appearance() {
        let goal = ResearchGoal::new("swarm routing");
        let subtopic_plan = plan("swarm routing");
        let documents = pool(vec![
            doc("arxiv", "a", "Paper A", ""),
            doc("arxiv", "b", "Paper B", ""),
        ]);

        // Paper B appears first (in the first subtopic), so it takes [1]
        let mut evidence: Vec<Vec<RetrievalResult>> =
            vec![Vec::new(); subtopic_plan.subtopics.len()];
        evidence[0] = vec![
            result("arxiv", "b", &subtopic_plan.subtopics[0].name, "About B."),
            result("arxiv", "a", &subtopic_plan.subtopics[0].name, "About A."),
        ];
        evidence[1] = vec![result(
            "arxiv",
            "b",
            &subtopic_plan.subtopics[1].name,
            "About B again.",
        )];

        let summarizer = ExtractiveSummarizer {
            sentences_per_chunk: 2,
        };
        let report = synthesize(
            &goal,
            &subtopic_plan,
            &evidence,
            &documents,
            CorpusStats::default(),
            vec![],
            &summarizer,
            &config(),
        );

        assert_eq!(report.citations.len(), 2);
        assert_eq!(report.citations[0].document.external_id, "b");
        assert_eq!(report.citations[0].index, 1);
        assert_eq!(report.citations[1].document.external_id, "a");
        assert_eq!(report.sections[0].citation_indices, vec![1, 2]);
        // Re-appearance reuses the existing number
        assert_eq!(report.sections[1].citation_indices, vec![1]);
    }

    #[test]
    fn test_empty_evidence_becomes_gap_section() {
        let goal = ResearchGoal::new("quantum dots");
        let subtopic_plan = plan("quantum dots");
        let evidence: Vec<Vec<RetrievalResult>> =
            vec![Vec::new(); subtopic_plan.subtopics.len()];

        let summarizer = ExtractiveSummarizer {
            sentences_per_chunk: 2,
        };
        let report = synthesize(
            &goal,
            &subtopic_plan,
            &evidence,
            &HashMap::new(),
            CorpusStats::default(),
            vec![],
            &summarizer,
            &config(),
        );

        assert_eq!(report.sections.len(), subtopic_plan.subtopics.len());
        for section in &report.sections {
            assert!(section.is_gap);
            assert!(section.supporting_chunks.is_empty());
            assert_eq!(section.narrative, GAP_NARRATIVE);
        }
        assert!(report.citations.is_empty());
    }

    #[test]
    fn test_key_themes_filter_goal_words_and_need_two_occurrences() {
        let docs = vec![
            doc(
                "arxiv",
                "a",
                "Pheromone trails in routing",
                "Pheromone gradients guide convergence.",
            ),
            doc(
                "arxiv",
                "b",
                "Convergence of swarm routing",
                "Stigmergy and convergence analysis.",
            ),
        ];
        let themes = extract_key_themes(docs.iter(), "swarm routing", 10);
        // "routing" is a goal word, "pheromone" and "convergence" appear twice
        assert!(themes.contains(&"pheromone".to_string()));
        assert!(themes.contains(&"convergence".to_string()));
        assert!(!themes.contains(&"routing".to_string()));
        assert!(!themes.contains(&"stigmergy".to_string()));
    }

    #[test]
    fn test_markdown_render_includes_sections_and_references() {
        let goal = ResearchGoal::new("swarm routing");
        let subtopic_plan = plan("swarm routing");
        let documents = pool(vec![doc("arxiv", "a", "Paper A", "")]);

        let mut evidence: Vec<Vec<RetrievalResult>> =
            vec![Vec::new(); subtopic_plan.subtopics.len()];
        evidence[0] = vec![result(
            "arxiv",
            "a",
            &subtopic_plan.subtopics[0].name,
            "Evidence sentence.",
        )];

        let summarizer = ExtractiveSummarizer {
            sentences_per_chunk: 1,
        };
        let mut stats = CorpusStats::default();
        stats.per_year_counts.insert(2021, 1);
        stats.per_year_counts.insert(2024, 2);
        let report = synthesize(
            &goal,
            &subtopic_plan,
            &evidence,
            &documents,
            stats,
            vec![SourceFailure {
                subtopic: "State of the art".to_string(),
                source: "wikipedia".to_string(),
                query: "swarm routing".to_string(),
                error: "timed out".to_string(),
            }],
            &summarizer,
            &config(),
        );

        let markdown = render_markdown(&report);
        assert!(markdown.contains("# Research Report: swarm routing"));
        assert!(markdown.contains("## Executive Summary"));
        assert!(markdown.contains("**Publication years:** 2021-2024"));
        assert!(markdown.contains("## Background & definitions"));
        assert!(markdown.contains("## Collection Notes"));
        assert!(markdown.contains("## References"));
        assert!(markdown.contains("1. Ada Lovelace (2024). Paper A. https://example.org/a"));
        assert!(markdown.contains(GAP_NARRATIVE));
    }

    #[test]
    fn test_format_authors() {
        let a = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(format_authors(&a(&["A"])), "A");
        assert_eq!(format_authors(&a(&["A", "B"])), "A & B");
        assert_eq!(format_authors(&a(&["A", "B", "C"])), "A, B & C");
        assert_eq!(format_authors(&a(&["A", "B", "C", "D"])), "A et al.");
    }
}

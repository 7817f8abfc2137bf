//! Semantic Scholar source adapter.
//!
//! Queries the Graph API paper search endpoint and normalizes results.
//! The free tier is heavily rate limited; the registry's per-adapter pacing
//! keeps us under it.

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::SourceAdapter;
use crate::error::SourceError;
use crate::models::Document;

pub const SOURCE_ID: &str = "semantic_scholar";

const API_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const FIELDS: &str = "paperId,title,abstract,authors,year,url";

/// The API rejects limits above 100.
const MAX_LIMIT: usize = 100;

pub struct SemanticScholarAdapter {
    client: reqwest::Client,
}

impl SemanticScholarAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SemanticScholarAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Deserialize)]
struct Paper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    year: Option<i32>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct Author {
    name: Option<String>,
}

#[async_trait]
impl SourceAdapter for SemanticScholarAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn description(&self) -> &str {
        "Semantic Scholar academic graph (free endpoints)"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Document>, SourceError> {
        let limit = max_results.min(MAX_LIMIT);

        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("query", query),
                ("limit", &limit.to_string()),
                ("fields", FIELDS),
            ])
            .header("User-Agent", "research-harness/0.3")
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "Semantic Scholar API returned {}",
                status
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("invalid response: {}", e)))?;

        Ok(parsed
            .data
            .into_iter()
            .filter_map(paper_to_document)
            .collect())
    }
}

fn paper_to_document(paper: Paper) -> Option<Document> {
    let external_id = paper.paper_id?;
    let title = paper.title.unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return None;
    }

    Some(Document {
        source: SOURCE_ID.to_string(),
        external_id,
        title,
        authors: paper
            .authors
            .into_iter()
            .filter_map(|a| a.name)
            .collect(),
        year: paper.year,
        abstract_text: paper.abstract_text.unwrap_or_default().trim().to_string(),
        url: paper.url,
        raw_text: String::new(),
    })
}

//! Wikipedia source adapter.
//!
//! Two-step flow against the free MediaWiki APIs: `list=search` to find
//! article titles, then the REST `page/summary` endpoint for a clean
//! extract. When the summary fetch fails the search snippet (HTML
//! stripped) is used instead, so one flaky article never drops the rest.

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapter::SourceAdapter;
use crate::error::SourceError;
use crate::models::Document;

pub const SOURCE_ID: &str = "wikipedia";

const SEARCH_URL: &str = "https://en.wikipedia.org/w/api.php";
const SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

pub struct WikipediaAdapter {
    client: reqwest::Client,
}

impl WikipediaAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WikipediaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    pageid: u64,
}

#[derive(Deserialize)]
struct PageSummary {
    #[serde(default)]
    extract: String,
    #[serde(default)]
    timestamp: Option<String>,
}

#[async_trait]
impl SourceAdapter for WikipediaAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn description(&self) -> &str {
        "Wikipedia articles via the MediaWiki API"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Document>, SourceError> {
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &max_results.to_string()),
                ("srprop", "snippet|size"),
            ])
            .header("User-Agent", "research-harness/0.3")
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "Wikipedia API returned {}",
                status
            )));
        }

        let envelope: SearchEnvelope = response
            .json()
            .await
            .map_err(|e| SourceError::Unavailable(format!("invalid response: {}", e)))?;

        let hits = envelope.query.map(|q| q.search).unwrap_or_default();
        let mut documents = Vec::with_capacity(hits.len());

        for hit in hits {
            let summary = self.fetch_summary(&hit.title).await;
            documents.push(hit_to_document(hit, summary));
        }

        Ok(documents)
    }
}

impl WikipediaAdapter {
    async fn fetch_summary(&self, title: &str) -> Option<PageSummary> {
        let path_title = title.replace(' ', "_");
        let response = self
            .client
            .get(format!("{}/{}", SUMMARY_URL, path_title))
            .header("User-Agent", "research-harness/0.3")
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }
}

fn hit_to_document(hit: SearchHit, summary: Option<PageSummary>) -> Document {
    let (abstract_text, year) = match summary {
        Some(s) if !s.extract.trim().is_empty() => {
            let year = s
                .timestamp
                .as_deref()
                .and_then(|t| t.get(..4))
                .and_then(|y| y.parse::<i32>().ok());
            (truncate(&s.extract, 500), year)
        }
        _ => (strip_html(&hit.snippet), None),
    };

    let url = format!(
        "https://en.wikipedia.org/wiki/{}",
        hit.title.replace(' ', "_")
    );

    Document {
        source: SOURCE_ID.to_string(),
        external_id: hit.pageid.to_string(),
        title: hit.title,
        authors: vec!["Wikipedia Contributors".to_string()],
        year,
        abstract_text,
        url: Some(url),
        raw_text: String::new(),
    }
}

/// Drop `<span class="searchmatch">`-style markup from search snippets.
fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.trim().to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

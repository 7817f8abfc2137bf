//! arXiv source adapter.
//!
//! Queries the arXiv Atom API with a fielded `all:"token"` AND-query built
//! from the stopword-filtered goal tokens, sorted by submission date
//! descending, and normalizes each `<entry>` into a [`Document`].

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::adapter::SourceAdapter;
use crate::error::SourceError;
use crate::models::Document;

pub const SOURCE_ID: &str = "arxiv";

const API_URL: &str = "http://export.arxiv.org/api/query";

const QUERY_STOPWORDS: [&str; 19] = [
    "latest", "recent", "developments", "the", "a", "an", "for", "in", "of", "and", "to", "on",
    "with", "towards", "into", "about", "overview", "state", "art",
];

pub struct ArxivAdapter {
    client: reqwest::Client,
}

impl ArxivAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ArxivAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    fn description(&self) -> &str {
        "arXiv preprints via the Atom export API"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Document>, SourceError> {
        let fielded = build_query(query);

        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("search_query", fielded.as_str()),
                ("max_results", &max_results.to_string()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .header("User-Agent", "research-harness/0.3")
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "arXiv API returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        parse_feed(&body)
    }
}

/// Build a fielded arXiv query: `all:"tok1" AND all:"tok2" ...` over up to
/// six cleaned tokens, falling back to the raw query as a single phrase.
fn build_query(query: &str) -> String {
    let tokens: Vec<String> = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.len() > 2 && !QUERY_STOPWORDS.contains(t))
        .take(6)
        .map(str::to_string)
        .collect();

    if tokens.is_empty() {
        return format!("all:\"{}\"", query.trim());
    }

    tokens
        .iter()
        .map(|t| format!("all:\"{}\"", t))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Parse an arXiv Atom feed into documents. Entries that fail to parse are
/// skipped; a malformed feed is a source failure.
fn parse_feed(xml: &str) -> Result<Vec<Document>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut documents = Vec::new();

    let mut in_entry = false;
    let mut path: Vec<String> = Vec::new();
    let mut entry = EntryDraft::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "entry" {
                    in_entry = true;
                    entry = EntryDraft::default();
                }
                path.push(name);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "entry" {
                    in_entry = false;
                    if let Some(doc) = std::mem::take(&mut entry).finish() {
                        documents.push(doc);
                    }
                }
                path.pop();
            }
            Ok(Event::Text(t)) if in_entry => {
                let text = t.unescape().unwrap_or_default().to_string();
                match path.last().map(String::as_str) {
                    Some("id") => entry.id.push_str(&text),
                    Some("title") => entry.title.push_str(&text),
                    Some("summary") => entry.summary.push_str(&text),
                    Some("published") => entry.published.push_str(&text),
                    Some("name") if path.iter().any(|p| p == "author") => {
                        entry.authors.push(text)
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::Unavailable(format!(
                    "malformed arXiv feed: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(documents)
}

#[derive(Default)]
struct EntryDraft {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
}

impl EntryDraft {
    fn finish(self) -> Option<Document> {
        let title = normalize_ws(&self.title);
        if title.is_empty() || self.id.is_empty() {
            return None;
        }

        // Atom ids look like http://arxiv.org/abs/2401.01234v1
        let external_id = self
            .id
            .rsplit("/abs/")
            .next()
            .unwrap_or(&self.id)
            .to_string();

        let year = self.published.get(..4).and_then(|y| y.parse::<i32>().ok());

        Some(Document {
            source: SOURCE_ID.to_string(),
            external_id,
            title,
            authors: self.authors,
            year,
            abstract_text: normalize_ws(&self.summary),
            url: Some(self.id),
            raw_text: String::new(),
        })
    }
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

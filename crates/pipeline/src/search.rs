//! Server-side execution of validated `web_search` commands.
//!
//! The backend does the network work; this module applies the command's
//! options to whatever it returns and summarizes the hits.

use dirflow_core::command::SearchOptions;
use dirflow_core::search::{SearchBackend, SearchHit};
use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RESULTS: usize = 10;

/// One executed search as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run one search and post-process its hits. Failures become an empty outcome.
pub async fn execute(backend: &dyn SearchBackend, query: &str, options: &SearchOptions) -> SearchOutcome {
    match backend.search(query, options).await {
        Ok(hits) => {
            let results = post_process(hits, options);
            debug!(backend = backend.name(), query = %query, hits = results.len(), "Search completed");
            SearchOutcome {
                query: query.into(),
                summary: summarize(query, &results),
                results,
                error: None,
            }
        }
        Err(e) => {
            warn!(backend = backend.name(), query = %query, error = %e, "Search failed");
            SearchOutcome {
                query: query.into(),
                results: Vec::new(),
                summary: summarize(query, &[]),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Apply domain filters and the result cap, and fill in each hit's source.
pub fn post_process(hits: Vec<SearchHit>, options: &SearchOptions) -> Vec<SearchHit> {
    let max = options
        .max_results
        .map_or(DEFAULT_MAX_RESULTS, usize::from);

    hits.into_iter()
        .filter(|hit| !hit.url.is_empty())
        .filter(|hit| {
            options.filter_domains.is_empty()
                || options.filter_domains.iter().any(|d| hit.url.contains(d.as_str()))
        })
        .filter(|hit| !options.exclude_domains.iter().any(|d| hit.url.contains(d.as_str())))
        .map(|mut hit| {
            if hit.source.is_empty() {
                hit.source = source_of(&hit.url);
            }
            if hit.title.is_empty() {
                hit.title = "No Title".into();
            }
            hit
        })
        .take(max)
        .collect()
}

/// Host name of a URL, or `unknown`.
pub fn source_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| "unknown".into())
}

/// One-line description of a result set.
pub fn summarize(query: &str, results: &[SearchHit]) -> String {
    if results.is_empty() {
        return format!("No search results were found for \"{query}\".");
    }

    let mut sources: Vec<&str> = Vec::new();
    for hit in results.iter().take(3) {
        if !sources.contains(&hit.source.as_str()) {
            sources.push(&hit.source);
        }
    }

    format!(
        "Found {} results for \"{query}\". Main sources: {}",
        results.len(),
        sources.join(", ")
    )
}

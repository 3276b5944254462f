//! Search backend trait — the narrow seam to an external web-search service.
//!
//! The pipeline never performs a search itself; callers that want
//! server-side execution of `web_search` commands attach a backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::SearchOptions;
use crate::error::SearchError;

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    /// Host name of `url`, filled in during post-processing when empty.
    #[serde(default)]
    pub source: String,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// A human-readable name for logs and status output.
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

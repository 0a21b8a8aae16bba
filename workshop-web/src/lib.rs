//! # Workshop Web
//!
//! Web-facing tools: provider-polymorphic search, readable-text fetch,
//! and the chunked map-reduce document summarizer. Fetched content is
//! treated as untrusted data, never as prompt instructions.

pub mod extract;
pub mod fetch;
pub mod search;
pub mod summarize;
pub mod tools;

use std::sync::Arc;

use extract::{ReadabilityExtractor, TagStripExtractor};

pub use extract::{collapse_spaces, normalize_whitespace, truncate_chars, Extraction};
pub use fetch::FetchedPage;
pub use search::{FetchedDoc, SearchOptions, SearchOutcome, SearchResult};
pub use summarize::{SummarizeRequest, Summarizer, SummaryOutcome, SummaryStyle};
pub use tools::{register_summarizer_tool, register_web_tools};

/// Search backend configuration. The keyed JSON API is used when an API
/// key is present; otherwise the public HTML endpoint is scraped.
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub search_api_key: Option<String>,
    pub search_api_url: String,
    pub search_scrape_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            search_api_key: None,
            search_api_url: "https://api.search.brave.com/res/v1/web/search".to_string(),
            search_scrape_url: "https://html.duckduckgo.com/html/".to_string(),
        }
    }
}

/// HTTP client shared by the web tools.
pub struct WebClient {
    http: reqwest::Client,
    config: WebConfig,
    extractor: Arc<dyn ReadabilityExtractor>,
}

impl WebClient {
    pub fn new(config: WebConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            extractor: Arc::new(TagStripExtractor::new()),
        }
    }

    /// Swap in a different readability collaborator.
    pub fn with_extractor(mut self, extractor: Arc<dyn ReadabilityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn config(&self) -> &WebConfig {
        &self.config
    }

    pub(crate) fn extractor(&self) -> &Arc<dyn ReadabilityExtractor> {
        &self.extractor
    }
}

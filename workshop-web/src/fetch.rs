//! Readable-Text Fetch
//!
//! Retrieves a URL and reduces it to single-spaced readable text,
//! truncated to a character budget.

use serde::Serialize;
use tracing::debug;

use workshop_core::WorkshopError;

use crate::extract::{collapse_spaces, truncate_chars};
use crate::WebClient;

/// Result of a fetch.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedPage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl WebClient {
    /// Fetch a URL and extract its readable text.
    pub async fn fetch(&self, url: &str, max_chars: usize) -> Result<FetchedPage, WorkshopError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(WorkshopError::InvalidInput(format!("not an http(s) URL: {url}")));
        }

        debug!(url, max_chars, "fetching page");
        let response = self
            .http()
            .get(url)
            .header("User-Agent", "workshop/0.1")
            .send()
            .await
            .map_err(|e| WorkshopError::ToolExecutionFailed(format!("fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WorkshopError::ToolExecutionFailed(format!(
                "fetch failed: HTTP {} for {url}",
                response.status().as_u16()
            )));
        }

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(false);

        let body = response
            .text()
            .await
            .map_err(|e| WorkshopError::ToolExecutionFailed(format!("fetch failed: {e}")))?;

        let (title, text) = if is_html || body.trim_start().starts_with('<') {
            let extraction = self.extractor().extract(&body);
            (extraction.title, collapse_spaces(&extraction.text))
        } else {
            (None, collapse_spaces(&body))
        };

        let (text, truncated) = truncate_chars(&text, max_chars);
        if truncated {
            debug!(url, max_chars, "fetched text truncated");
        }

        Ok(FetchedPage {
            url: url.to_string(),
            title,
            text,
        })
    }
}

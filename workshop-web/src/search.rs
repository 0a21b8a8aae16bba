//! Web Search
//!
//! Provider-polymorphic search: a key-authenticated JSON API when a key
//! is configured, otherwise a scrape of a public HTML endpoint. Top
//! results can be fetched inline; per-result fetch failures are embedded
//! and never fail the whole call.

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use workshop_core::WorkshopError;

use crate::extract::collapse_spaces;
use crate::WebClient;

/// Options for a search call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub count: usize,
    /// Also fetch the top results.
    pub fetch: bool,
    /// Defaults to `min(3, count)`.
    pub fetch_count: Option<usize>,
    /// Per-page character budget for inline fetches.
    pub max_chars: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            count: 5,
            fetch: true,
            fetch_count: None,
            max_chars: 20_000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// An inline-fetched result. `text` is empty when `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedDoc {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched: Option<Vec<FetchedDoc>>,
}

impl WebClient {
    /// Search the web and optionally fetch the top results.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<SearchOutcome, WorkshopError> {
        let results = if self.config().search_api_key.is_some() {
            self.search_keyed(query, options.count).await?
        } else {
            self.search_scrape(query, options.count).await?
        };
        debug!(query, count = results.len(), "search results");

        let fetched = if options.fetch {
            let limit = options
                .fetch_count
                .unwrap_or_else(|| options.count.min(3))
                .min(results.len());
            let mut docs = Vec::with_capacity(limit);
            for result in results.iter().take(limit) {
                match self.fetch(&result.url, options.max_chars).await {
                    Ok(page) => docs.push(FetchedDoc {
                        url: page.url,
                        title: page.title.or_else(|| Some(result.title.clone())),
                        text: page.text,
                        error: None,
                    }),
                    Err(e) => docs.push(FetchedDoc {
                        url: result.url.clone(),
                        title: Some(result.title.clone()),
                        text: String::new(),
                        error: Some(e.to_string()),
                    }),
                }
            }
            Some(docs)
        } else {
            None
        };

        Ok(SearchOutcome { results, fetched })
    }

    async fn search_keyed(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<SearchResult>, WorkshopError> {
        let Some(key) = self.config().search_api_key.as_deref() else {
            return Err(WorkshopError::InvalidInput(
                "keyed search backend requires an api key".to_string(),
            ));
        };

        let response = self
            .http()
            .get(&self.config().search_api_url)
            .query(&[("q", query), ("count", &count.to_string())])
            .header("X-Subscription-Token", key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| WorkshopError::ToolExecutionFailed(format!("search failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WorkshopError::ToolExecutionFailed(format!(
                "search failed: HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WorkshopError::ToolExecutionFailed(format!("search failed: {e}")))?;

        let results = body["web"]["results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .take(count)
                    .filter_map(|item| {
                        Some(SearchResult {
                            title: item["title"].as_str()?.to_string(),
                            url: item["url"].as_str()?.to_string(),
                            snippet: item["description"].as_str().unwrap_or("").to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(results)
    }

    async fn search_scrape(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<SearchResult>, WorkshopError> {
        let response = self
            .http()
            .get(&self.config().search_scrape_url)
            .query(&[("q", query)])
            .header("User-Agent", "workshop/0.1")
            .send()
            .await
            .map_err(|e| WorkshopError::ToolExecutionFailed(format!("search failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WorkshopError::ToolExecutionFailed(format!(
                "search failed: HTTP {}",
                response.status().as_u16()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| WorkshopError::ToolExecutionFailed(format!("search failed: {e}")))?;

        Ok(parse_scraped_results(&html, count))
    }
}

/// Pull `(title, url, snippet)` triples out of the public endpoint's
/// result markup.
pub(crate) fn parse_scraped_results(html: &str, count: usize) -> Vec<SearchResult> {
    let anchor = Regex::new(r#"(?is)<a[^>]*class="[^"]*result__a[^"]*"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
        .expect("anchor regex");
    let snippet = Regex::new(r#"(?is)<a[^>]*class="[^"]*result__snippet[^"]*"[^>]*>(.*?)</a>"#)
        .expect("snippet regex");
    let tags = Regex::new(r"(?s)<[^>]+>").expect("tag regex");

    let snippets: Vec<String> = snippet
        .captures_iter(html)
        .map(|c| collapse_spaces(&tags.replace_all(&c[1], " ")))
        .collect();

    anchor
        .captures_iter(html)
        .take(count)
        .enumerate()
        .map(|(i, c)| SearchResult {
            title: collapse_spaces(&tags.replace_all(&c[2], " ")),
            url: resolve_redirect_url(&c[1]),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

/// The public endpoint wraps result links in a redirect with the real
/// target in the `uddg` query parameter.
fn resolve_redirect_url(href: &str) -> String {
    if !href.contains("uddg=") {
        return href.to_string();
    }
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    if let Ok(url) = url::Url::parse(&absolute) {
        for (key, value) in url.query_pairs() {
            if key == "uddg" {
                return value.into_owned();
            }
        }
    }
    href.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scraped_results_pair_titles_and_snippets() {
        let html = r##"
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.com/a">First <b>Hit</b></a>
  <a class="result__snippet" href="#">Snippet one here.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.com/b">Second Hit</a>
  <a class="result__snippet" href="#">Snippet two.</a>
</div>
"##;
        let results = parse_scraped_results(html, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "First Hit");
        assert_eq!(results[0].url, "https://example.com/a");
        assert_eq!(results[0].snippet, "Snippet one here.");
        assert_eq!(results[1].title, "Second Hit");
    }

    #[test]
    fn scraped_results_honor_count() {
        let html = r#"
<a class="result__a" href="https://example.com/1">One</a>
<a class="result__a" href="https://example.com/2">Two</a>
<a class="result__a" href="https://example.com/3">Three</a>
"#;
        let results = parse_scraped_results(html, 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn redirect_urls_are_unwrapped() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=abc";
        assert_eq!(resolve_redirect_url(href), "https://example.com/page");
        assert_eq!(
            resolve_redirect_url("https://example.com/direct"),
            "https://example.com/direct"
        );
    }

    #[test]
    fn default_options() {
        let options = SearchOptions::default();
        assert_eq!(options.count, 5);
        assert!(options.fetch);
        assert!(options.fetch_count.is_none());
        assert_eq!(options.max_chars, 20_000);
    }
}

//! Registry Adapters
//!
//! Exposes search, fetch, and summarize as registered tools.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use workshop_core::registry::{ToolHandler, ToolRegistry};
use workshop_core::types::ToolDefinition;
use workshop_core::WorkshopError;

use crate::search::SearchOptions;
use crate::summarize::{SummarizeRequest, Summarizer, SummaryStyle};
use crate::WebClient;

fn required_str(args: &serde_json::Value, field: &str) -> Result<String, WorkshopError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| WorkshopError::InvalidInput(format!("missing required field: {field}")))
}

/// Register `web_search` and `web_fetch`.
pub fn register_web_tools(registry: &mut ToolRegistry, web: Arc<WebClient>) {
    let client = web.clone();
    let handler: ToolHandler = Arc::new(move |args| {
        let client = client.clone();
        Box::pin(async move {
            let query = required_str(&args, "query")?;
            let defaults = SearchOptions::default();
            let count = args
                .get("count")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(defaults.count);
            let options = SearchOptions {
                count,
                fetch: args
                    .get("fetch")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(defaults.fetch),
                fetch_count: args
                    .get("fetch_count")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as usize),
                max_chars: args
                    .get("max_chars")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as usize)
                    .unwrap_or(defaults.max_chars),
            };
            let outcome = client.search(&query, options).await?;
            Ok(serde_json::to_value(outcome).unwrap_or_default())
        })
    });
    registry.register(
        ToolDefinition {
            name: "web_search".to_string(),
            description: "Search the web. Optionally fetches readable text for the top results."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "count": { "type": "integer", "description": "Number of results (default 5)" },
                    "fetch": { "type": "boolean", "description": "Also fetch top results (default true)" },
                    "fetch_count": { "type": "integer", "description": "How many results to fetch (default min(3, count))" },
                    "max_chars": { "type": "integer", "description": "Per-page character budget (default 20000)" }
                },
                "required": ["query"]
            }),
        },
        false,
        handler,
    );

    let client = web;
    let handler: ToolHandler = Arc::new(move |args| {
        let client = client.clone();
        Box::pin(async move {
            let url = required_str(&args, "url")?;
            let max_chars = args
                .get("max_chars")
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .unwrap_or(20_000);
            let page = client.fetch(&url, max_chars).await?;
            Ok(serde_json::to_value(page).unwrap_or_default())
        })
    });
    registry.register(
        ToolDefinition {
            name: "web_fetch".to_string(),
            description: "Fetch a URL and return its readable text.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string" },
                    "max_chars": { "type": "integer", "description": "Character budget (default 20000)" }
                },
                "required": ["url"]
            }),
        },
        false,
        handler,
    );
}

/// Register `summarize_doc`.
pub fn register_summarizer_tool(registry: &mut ToolRegistry, summarizer: Arc<Summarizer>) {
    let handler: ToolHandler = Arc::new(move |args| {
        let summarizer = summarizer.clone();
        Box::pin(async move {
            let source = required_str(&args, "source")?;
            let style = match args.get("style").and_then(|v| v.as_str()) {
                Some("detailed") => SummaryStyle::Detailed,
                Some("bullets") => SummaryStyle::Bullets,
                _ => SummaryStyle::Brief,
            };
            let request = SummarizeRequest {
                source,
                style,
                focus: args
                    .get("focus")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                max_chars: args
                    .get("max_chars")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as usize)
                    .unwrap_or(60_000),
            };
            let outcome = summarizer.summarize(request, &CancellationToken::new()).await;
            Ok(serde_json::to_value(outcome).unwrap_or_default())
        })
    });
    registry.register(
        ToolDefinition {
            name: "summarize_doc".to_string(),
            description: "Summarize a workspace file or a URL (brief, detailed, or bullets)."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "source": { "type": "string", "description": "Workspace-relative file path or http(s) URL" },
                    "style": { "type": "string", "enum": ["brief", "detailed", "bullets"] },
                    "focus": { "type": "string", "description": "Optional focus topic" },
                    "max_chars": { "type": "integer", "description": "Source character budget (default 60000)" }
                },
                "required": ["source"]
            }),
        },
        false,
        handler,
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WebConfig;

    #[test]
    fn web_tools_register_as_read_only() {
        let mut registry = ToolRegistry::new();
        register_web_tools(&mut registry, Arc::new(WebClient::new(WebConfig::default())));
        assert!(!registry.get("web_search").unwrap().writable);
        assert!(!registry.get("web_fetch").unwrap().writable);
    }
}

//! Document Summarizer
//!
//! Chunked map-reduce summarization over a file or URL: load, normalize,
//! chunk on paragraph boundaries, summarize each chunk, and combine. All
//! failures are embedded in the outcome's `error` field.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use workshop_core::provider::{ChatProvider, ChatRequest, ToolChoice};
use workshop_core::types::Message;
use workshop_core::WorkshopError;

use crate::extract::{normalize_whitespace, truncate_chars, ReadabilityExtractor, TagStripExtractor};
use crate::WebClient;

/// Maximum characters per summarization chunk.
const CHUNK_LIMIT: usize = 12_000;

const SUMMARIZER_PROMPT: &str = "You are a precise summarizer. Preserve concrete facts, \
names, and numbers; never invent content.";

const COMBINER_PROMPT: &str = "You combine chunk summaries of a single document into one \
coherent summary, removing repetition.";

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Brief,
    Detailed,
    Bullets,
}

impl SummaryStyle {
    fn instruction(&self) -> &'static str {
        match self {
            SummaryStyle::Brief => "Write a brief summary in 5-8 sentences.",
            SummaryStyle::Bullets => "Write 5-10 bullet points capturing the key facts.",
            SummaryStyle::Detailed => {
                "Write a detailed summary in short paragraphs covering all substantive points."
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    /// A workspace-relative file path or an http(s) URL.
    pub source: String,
    pub style: SummaryStyle,
    pub focus: Option<String>,
    pub max_chars: usize,
}

impl SummarizeRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            style: SummaryStyle::default(),
            focus: None,
            max_chars: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    File,
    Url,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    pub source: String,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub style: SummaryStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    pub truncated: bool,
    pub chunk_count: usize,
    pub text_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// Map-reduce summarizer. The chat provider and readability extractor are
/// injected collaborators.
pub struct Summarizer {
    provider: Arc<dyn ChatProvider>,
    web: Arc<WebClient>,
    workspace_root: PathBuf,
    extractor: Arc<dyn ReadabilityExtractor>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn ChatProvider>, web: Arc<WebClient>, workspace_root: PathBuf) -> Self {
        Self {
            provider,
            web,
            workspace_root,
            extractor: Arc::new(TagStripExtractor::new()),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ReadabilityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Summarize a source. Never fails; every error lands in the outcome.
    pub async fn summarize(
        &self,
        request: SummarizeRequest,
        cancel: &CancellationToken,
    ) -> SummaryOutcome {
        let is_url =
            request.source.starts_with("http://") || request.source.starts_with("https://");
        let mut outcome = SummaryOutcome {
            source: request.source.clone(),
            source_type: if is_url { SourceType::Url } else { SourceType::File },
            title: None,
            summary: None,
            style: request.style,
            focus: request.focus.clone(),
            truncated: false,
            chunk_count: 0,
            text_chars: 0,
            error: None,
        };

        let raw = if is_url {
            match self.web.fetch(&request.source, usize::MAX).await {
                Ok(page) => {
                    outcome.title = page.title;
                    page.text
                }
                Err(e) => {
                    outcome.error = Some(format!("failed to load source: {e}"));
                    return outcome;
                }
            }
        } else {
            match self.load_file(&request.source, &mut outcome) {
                Ok(text) => text,
                Err(e) => {
                    outcome.error = Some(format!("failed to load source: {e}"));
                    return outcome;
                }
            }
        };

        let (raw, truncated) = truncate_chars(&raw, request.max_chars);
        outcome.truncated = truncated;

        let text = normalize_whitespace(&raw);
        outcome.text_chars = text.chars().count();
        if text.is_empty() {
            outcome.error = Some("source contains no text to summarize".to_string());
            return outcome;
        }

        let chunks = chunk_text(&text, CHUNK_LIMIT);
        outcome.chunk_count = chunks.len();
        debug!(
            source = %request.source,
            chunks = chunks.len(),
            chars = outcome.text_chars,
            "summarizing"
        );

        let mut chunk_summaries = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            match self
                .summarize_chunk(chunk, request.style, request.focus.as_deref(), cancel)
                .await
            {
                Ok(summary) => chunk_summaries.push(summary),
                Err(e) => {
                    outcome.error = Some(format!("chunk summarization failed: {e}"));
                    return outcome;
                }
            }
        }

        let summary = if chunk_summaries.len() >= 2 {
            match self
                .combine(&chunk_summaries, request.style, request.focus.as_deref(), cancel)
                .await
            {
                Ok(summary) => summary,
                Err(e) => {
                    outcome.error = Some(format!("combine pass failed: {e}"));
                    return outcome;
                }
            }
        } else {
            chunk_summaries.pop().unwrap_or_default()
        };

        outcome.summary = Some(summary);
        outcome
    }

    fn load_file(
        &self,
        source: &str,
        outcome: &mut SummaryOutcome,
    ) -> Result<String, WorkshopError> {
        let resolved = workshop_sandbox::resolve(&self.workspace_root, source)
            .map_err(workshop_core::WorkshopError::from)?;
        if !resolved.absolute.is_file() {
            return Err(WorkshopError::NotFound(format!("no such file: {source}")));
        }
        let content = std::fs::read_to_string(&resolved.absolute)?;

        let is_html = resolved
            .absolute
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);
        if is_html {
            let extraction = self.extractor.extract(&content);
            outcome.title = extraction.title;
            Ok(extraction.text)
        } else {
            Ok(content)
        }
    }

    async fn summarize_chunk(
        &self,
        chunk: &str,
        style: SummaryStyle,
        focus: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, WorkshopError> {
        let prompt = format!(
            "{}{}\n\nText:\n{}",
            style.instruction(),
            focus_clause(focus),
            chunk
        );
        self.ask(SUMMARIZER_PROMPT, &prompt, cancel).await
    }

    async fn combine(
        &self,
        summaries: &[String],
        style: SummaryStyle,
        focus: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, WorkshopError> {
        let numbered: Vec<String> = summaries
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}) {}", i + 1, s))
            .collect();
        let prompt = format!(
            "Combine the chunk summaries below into one summary. {}{}\n\nChunk summaries:\n{}",
            style.instruction(),
            focus_clause(focus),
            numbered.join("\n")
        );
        self.ask(COMBINER_PROMPT, &prompt, cancel).await
    }

    async fn ask(
        &self,
        system: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, WorkshopError> {
        let request = ChatRequest::new(vec![Message::system(system), Message::user(prompt)])
            .with_tool_choice(ToolChoice::None)
            .with_temperature(0.2);
        let outcome = self.provider.chat(request, cancel).await?;
        let text = outcome.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(WorkshopError::provider("empty summarization response"));
        }
        Ok(text)
    }
}

fn focus_clause(focus: Option<&str>) -> String {
    match focus {
        Some(focus) => format!(" Focus on: {focus}."),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Split text into chunks of at most `limit` characters, packing whole
/// paragraphs greedily. Oversized paragraphs are hard-sliced.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for paragraph in text.split("\n\n") {
        let para_chars = paragraph.chars().count();

        if para_chars > limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            let mut rest: Vec<char> = paragraph.chars().collect();
            while !rest.is_empty() {
                let take = rest.len().min(limit);
                chunks.push(rest[..take].iter().collect());
                rest.drain(..take);
            }
            continue;
        }

        let separator = if current.is_empty() { 0 } else { 2 };
        if current_chars + separator + para_chars > limit {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
            current_chars += 2;
        }
        current.push_str(paragraph);
        current_chars += para_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

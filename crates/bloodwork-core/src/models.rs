/// One page of extracted report text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PageText {
    /// 1-based position in source order.
    pub page_number: usize,
    pub content: String,
}

impl PageText {
    pub fn new(page_number: usize, content: impl Into<String>) -> Self {
        Self {
            page_number,
            content: content.into(),
        }
    }
}

/// A single request to the completion service.
///
/// `message` is the combined `System: ...\nUser: ...` text blob; the
/// service is treated as a plain text-completion endpoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub message: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Result of running the extraction pipeline over a whole document.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ExtractionOutput {
    /// Structured page documents in ascending page order. Pages that failed
    /// permanently are omitted, without a placeholder.
    pub documents: Vec<serde_json::Value>,
    /// Page numbers that exhausted every attempt, ascending.
    pub failed_pages: Vec<usize>,
    pub total_pages: usize,
}

impl ExtractionOutput {
    pub fn is_partial(&self) -> bool {
        !self.failed_pages.is_empty()
    }
}

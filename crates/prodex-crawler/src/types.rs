use serde::{Deserialize, Serialize};

use prodex_core::now_rfc3339;

/// Outcome of one crawl: either a fetched page or a recorded failure.
///
/// The fetch layer never raises for page-level problems; it encodes them
/// here (`success = false`, `error` populated) so the retry handler and
/// callers can decide what to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Markdown rendition, when the renderer produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    /// HTTP status of the final response, when one was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Fragments produced by the configured content filters, with a
    /// `--- <name> ---` header line before each named chain's output.
    #[serde(default)]
    pub extracted_content: Vec<String>,
    pub url: String,
    /// RFC 3339 timestamp of when the result was produced.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of retries that were needed (0 when the first attempt worked).
    #[serde(default)]
    pub retries: u32,
}

impl CrawlResult {
    #[must_use]
    pub fn success(url: impl Into<String>, html: String, status: Option<u16>) -> Self {
        Self {
            success: true,
            html: Some(html),
            markdown: None,
            status,
            extracted_content: Vec::new(),
            url: url.into(),
            timestamp: now_rfc3339(),
            error: None,
            retries: 0,
        }
    }

    #[must_use]
    pub fn failure(url: impl Into<String>, error: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            success: false,
            html: None,
            markdown: None,
            status,
            extracted_content: Vec::new(),
            url: url.into(),
            timestamp: now_rfc3339(),
            error: Some(error.into()),
            retries: 0,
        }
    }

    /// Length of the fetched HTML, 0 when absent.
    #[must_use]
    pub fn html_len(&self) -> usize {
        self.html.as_ref().map_or(0, String::len)
    }
}

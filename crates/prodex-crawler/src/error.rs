use thiserror::Error;

/// Errors raised by the fetch layer. Filter-configuration problems have
/// their own type ([`FilterError`]) because they are construction-time
/// errors, never transient.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("page rendering failed for {url}: {reason}")]
    Render { url: String, reason: String },

    #[error("no JS renderer configured but JS rendering was requested for {url}")]
    RendererUnavailable { url: String },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("invalid crawler configuration: {0}")]
    Config(String),
}

impl CrawlerError {
    /// Whether this error class is worth retrying after a backoff delay.
    ///
    /// Retriable: network-level failures (connect, timeout), server-side
    /// statuses from the retry set, and render failures. Configuration and
    /// filter errors are permanent and propagate immediately.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            CrawlerError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            CrawlerError::UnexpectedStatus { status, .. } => {
                crate::retry::DEFAULT_RETRY_CODES.contains(status)
            }
            CrawlerError::Render { .. } => true,
            CrawlerError::RendererUnavailable { .. }
            | CrawlerError::Filter(_)
            | CrawlerError::Config(_) => false,
        }
    }
}

/// Construction-time errors for content filters and filter chains.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid CSS selector \"{selector}\"")]
    InvalidSelector { selector: String },

    #[error("unsupported XPath expression \"{expression}\"")]
    UnsupportedXPath { expression: String },

    #[error("invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid filter threshold {value}: must be finite and non-negative")]
    InvalidThreshold { value: f64 },

    #[error("filter chain requires at least one filter")]
    EmptyChain,

    #[error("unknown chain strategy \"{0}\": expected ALL, ANY, or SEQUENCE")]
    UnknownStrategy(String),

    #[error("LLM filter error: {0}")]
    Llm(#[from] prodex_core::LlmError),
}

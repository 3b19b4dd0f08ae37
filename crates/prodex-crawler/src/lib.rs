pub mod error;
pub mod fetcher;
pub mod filter;
pub mod rate_limit;
pub mod render;
pub mod retry;
pub mod types;

pub use error::{CrawlerError, FilterError};
pub use fetcher::{CrawlOptions, FetcherConfig, PageFetcher};
pub use filter::{translate_xpath, ChainStrategy, ContentFilter, FilterChain, XPathQuery};
pub use rate_limit::RateLimiter;
pub use render::{
    LoadState, PageRenderer, RenderOptions, RenderWait, RenderedPage, PREDICATE_POLL_INTERVAL,
};
pub use retry::{
    default_retry_condition, BackoffStrategy, RetryHandler, RetryPolicy, RetryPredicate,
    DEFAULT_RETRY_CODES,
};
pub use types::CrawlResult;

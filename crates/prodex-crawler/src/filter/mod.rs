//! Content filters and filter chains.
//!
//! A [`ContentFilter`] reduces HTML to a list of string fragments. Filters
//! are a tagged variant — CSS, XPath, regex, BM25, pruning, LLM — and a
//! [`FilterChain`] is itself a variant case, so chains nest without special
//! cases. Selector and pattern validity is checked at construction; `apply`
//! only fails for LLM provider errors.

mod blocks;
mod bm25;
mod prune;
mod xpath;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;
use scraper::{Html, Selector};

use prodex_core::{LlmClient, LlmParams};

use crate::error::FilterError;
pub use xpath::{translate_xpath, XPathQuery};

pub(crate) use blocks::element_text;

/// A single content-filtering operation: `apply(html) -> [fragment]`.
#[derive(Clone)]
pub enum ContentFilter {
    Css {
        selector: String,
        extract_text: bool,
    },
    XPath {
        expression: String,
        query: XPathQuery,
        extract_text: bool,
    },
    Regex {
        pattern: Regex,
        replacement: Option<String>,
    },
    Bm25 {
        query: String,
        threshold: f64,
    },
    Pruning {
        query: Option<String>,
        threshold: f64,
    },
    Llm {
        instruction: String,
        client: Arc<dyn LlmClient>,
        params: LlmParams,
    },
    Chain(FilterChain),
}

impl fmt::Debug for ContentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { selector, .. } => write!(f, "ContentFilter::Css({selector})"),
            Self::XPath { expression, .. } => write!(f, "ContentFilter::XPath({expression})"),
            Self::Regex { pattern, .. } => write!(f, "ContentFilter::Regex({pattern})"),
            Self::Bm25 { query, threshold } => {
                write!(f, "ContentFilter::Bm25({query}, {threshold})")
            }
            Self::Pruning { threshold, .. } => write!(f, "ContentFilter::Pruning({threshold})"),
            Self::Llm { instruction, .. } => write!(f, "ContentFilter::Llm({instruction})"),
            Self::Chain(chain) => write!(f, "ContentFilter::Chain({chain:?})"),
        }
    }
}

fn validate_threshold(value: f64) -> Result<f64, FilterError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(FilterError::InvalidThreshold { value })
    }
}

impl ContentFilter {
    /// CSS selector filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidSelector`] for unparseable selectors.
    pub fn css(selector: impl Into<String>, extract_text: bool) -> Result<Self, FilterError> {
        let selector = selector.into();
        if Selector::parse(&selector).is_err() {
            return Err(FilterError::InvalidSelector { selector });
        }
        Ok(Self::Css {
            selector,
            extract_text,
        })
    }

    /// XPath filter over the supported translation subset.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnsupportedXPath`] for expressions outside the
    /// subset.
    pub fn xpath(expression: impl Into<String>, extract_text: bool) -> Result<Self, FilterError> {
        let expression = expression.into();
        let query = translate_xpath(&expression)?;
        Ok(Self::XPath {
            expression,
            query,
            extract_text,
        })
    }

    /// Regex filter: substitution when `replacement` is set, capture
    /// extraction otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidPattern`] for invalid patterns.
    pub fn regex(
        pattern: &str,
        replacement: Option<String>,
    ) -> Result<Self, FilterError> {
        Ok(Self::Regex {
            pattern: Regex::new(pattern)?,
            replacement,
        })
    }

    /// BM25 relevance filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidThreshold`] for non-finite or negative
    /// thresholds.
    pub fn bm25(query: impl Into<String>, threshold: f64) -> Result<Self, FilterError> {
        Ok(Self::Bm25 {
            query: query.into(),
            threshold: validate_threshold(threshold)?,
        })
    }

    /// Structural pruning filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidThreshold`] for non-finite or negative
    /// thresholds.
    pub fn pruning(query: Option<String>, threshold: f64) -> Result<Self, FilterError> {
        Ok(Self::Pruning {
            query,
            threshold: validate_threshold(threshold)?,
        })
    }

    /// LLM fragment filter: submits the HTML plus `instruction` to the
    /// provider and returns the provider's fragment list.
    #[must_use]
    pub fn llm(
        instruction: impl Into<String>,
        client: Arc<dyn LlmClient>,
        params: LlmParams,
    ) -> Self {
        Self::Llm {
            instruction: instruction.into(),
            client,
            params,
        }
    }

    /// Applies the filter to `html`.
    ///
    /// # Errors
    ///
    /// Only the LLM variant can fail at apply time ([`FilterError::Llm`]);
    /// every other variant was fully validated at construction.
    pub async fn apply(&self, html: &str) -> Result<Vec<String>, FilterError> {
        match self {
            Self::Css {
                selector,
                extract_text,
            } => {
                let parsed = Selector::parse(selector).map_err(|_| {
                    FilterError::InvalidSelector {
                        selector: selector.clone(),
                    }
                })?;
                Ok(select_fragments(html, &parsed, *extract_text))
            }
            Self::XPath {
                query,
                extract_text,
                expression,
            } => {
                let parsed = Selector::parse(&query.css).map_err(|_| {
                    FilterError::UnsupportedXPath {
                        expression: expression.clone(),
                    }
                })?;
                if let Some(attr) = &query.attribute {
                    let document = Html::parse_document(html);
                    Ok(document
                        .select(&parsed)
                        .filter_map(|el| el.value().attr(attr))
                        .map(|v| v.trim().to_owned())
                        .filter(|v| !v.is_empty())
                        .collect())
                } else {
                    Ok(select_fragments(
                        html,
                        &parsed,
                        *extract_text || query.text_only,
                    ))
                }
            }
            Self::Regex {
                pattern,
                replacement,
            } => Ok(apply_regex(html, pattern, replacement.as_deref())),
            Self::Bm25 { query, threshold } => Ok(bm25::filter(html, query, *threshold)),
            Self::Pruning { query, threshold } => {
                Ok(prune::filter(html, query.as_deref(), *threshold))
            }
            Self::Llm {
                instruction,
                client,
                params,
            } => {
                let prompt = format!(
                    "{instruction}\n\nHTML:\n{html}\n\n\
                     Return the relevant content fragments as a JSON array of strings."
                );
                let reply = client.complete(&prompt, params).await?;
                Ok(parse_fragment_reply(&reply))
            }
            Self::Chain(chain) => chain.apply(html).await,
        }
    }
}

fn select_fragments(html: &str, selector: &Selector, extract_text: bool) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .map(|el| {
            if extract_text {
                element_text(el)
            } else {
                el.html()
            }
        })
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

fn apply_regex(html: &str, pattern: &Regex, replacement: Option<&str>) -> Vec<String> {
    if let Some(replacement) = replacement {
        return vec![pattern.replace_all(html, replacement).into_owned()];
    }
    let group_count = pattern.captures_len();
    pattern
        .captures_iter(html)
        .map(|captures| match group_count {
            // No capture groups: the whole match.
            1 => captures.get(0).map_or(String::new(), |m| m.as_str().to_owned()),
            // A single group: its capture.
            2 => captures.get(1).map_or(String::new(), |m| m.as_str().to_owned()),
            // Multiple groups: join the captures.
            _ => (1..group_count)
                .filter_map(|i| captures.get(i))
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect()
}

/// Parses an LLM fragment reply: a JSON array of strings when possible,
/// otherwise blank-line-separated chunks.
fn parse_fragment_reply(reply: &str) -> Vec<String> {
    let body = strip_code_fences(reply);
    if let Ok(fragments) = serde_json::from_str::<Vec<String>>(body) {
        return fragments;
    }
    body.split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_owned)
        .collect()
}

fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// How a chain combines the outputs of its member filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStrategy {
    /// Intersection of every filter's output (trim-exact equality).
    All,
    /// Union of every filter's output.
    Any,
    /// Fold: each stage filters the previous stage's output set.
    Sequence,
}

impl FromStr for ChainStrategy {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "ANY" => Ok(Self::Any),
            "SEQUENCE" => Ok(Self::Sequence),
            other => Err(FilterError::UnknownStrategy(other.to_owned())),
        }
    }
}

impl fmt::Display for ChainStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "ALL"),
            Self::Any => write!(f, "ANY"),
            Self::Sequence => write!(f, "SEQUENCE"),
        }
    }
}

/// A recursive composition of filters under one [`ChainStrategy`].
#[derive(Debug, Clone)]
pub struct FilterChain {
    filters: Vec<ContentFilter>,
    strategy: ChainStrategy,
    name: Option<String>,
}

impl FilterChain {
    /// Builds a chain over `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::EmptyChain`] when `filters` is empty.
    pub fn new(
        filters: Vec<ContentFilter>,
        strategy: ChainStrategy,
        name: Option<String>,
    ) -> Result<Self, FilterError> {
        if filters.is_empty() {
            return Err(FilterError::EmptyChain);
        }
        Ok(Self {
            filters,
            strategy,
            name,
        })
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn strategy(&self) -> ChainStrategy {
        self.strategy
    }

    /// Applies the chain to `html`.
    ///
    /// `SEQUENCE` preserves input order and short-circuits to empty when a
    /// stage yields nothing; `ALL` and `ANY` return deterministic but
    /// unordered (sorted, deduplicated) output.
    pub fn apply<'a>(&'a self, html: &'a str) -> BoxFuture<'a, Result<Vec<String>, FilterError>> {
        async move {
            match self.strategy {
                ChainStrategy::Sequence => {
                    let mut current = vec![html.to_owned()];
                    for filter in &self.filters {
                        let mut next = Vec::new();
                        for chunk in &current {
                            next.extend(filter.apply(chunk).await?);
                        }
                        current = next;
                        if current.is_empty() {
                            break;
                        }
                    }
                    Ok(current)
                }
                ChainStrategy::All => {
                    let mut intersection: Option<BTreeSet<String>> = None;
                    for filter in &self.filters {
                        let output: BTreeSet<String> = filter
                            .apply(html)
                            .await?
                            .into_iter()
                            .map(|s| s.trim().to_owned())
                            .collect();
                        intersection = Some(match intersection {
                            None => output,
                            Some(acc) => acc.intersection(&output).cloned().collect(),
                        });
                        if intersection.as_ref().is_some_and(BTreeSet::is_empty) {
                            break;
                        }
                    }
                    Ok(intersection.unwrap_or_default().into_iter().collect())
                }
                ChainStrategy::Any => {
                    let mut union = BTreeSet::new();
                    for filter in &self.filters {
                        union.extend(
                            filter
                                .apply(html)
                                .await?
                                .into_iter()
                                .map(|s| s.trim().to_owned()),
                        );
                    }
                    Ok(union.into_iter().collect())
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;

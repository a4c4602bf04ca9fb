//! Quote tools backed by ZenQuotes with a built-in fallback table.
//!
//! `get_random_quote` without a category asks the upstream API first and
//! falls back to the local table on any failure. ZenQuotes does not know
//! categories, so a category filter is always answered from the local table.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::error::RegistryError;
use crate::mcp::context::CallContext;
use crate::mcp::registry::{ToolHandler, ToolRegistry};
use crate::tools::upstream::{UpstreamClient, UpstreamError};

/// Results returned when `limit` is absent or not positive.
pub const DEFAULT_SEARCH_LIMIT: i64 = 5;

/// Upper bound on search results.
pub const MAX_SEARCH_LIMIT: i64 = 10;

/// Errors from the quote tools.
#[derive(Error, Debug)]
pub enum QuotesError {
    /// The category filter matched nothing.
    #[error("no quotes found for category: {category}")]
    NoQuotesForCategory {
        /// The requested category, as given.
        category: String,
    },

    /// The upstream answered with an empty list.
    #[error("empty response from API")]
    EmptyResponse,

    /// The upstream request failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// One entry of the built-in table.
#[derive(Debug, Clone, Copy)]
pub struct StaticQuote {
    /// Quote text.
    pub text: &'static str,
    /// Attribution.
    pub author: &'static str,
    /// Lower-case category.
    pub category: &'static str,
}

const fn quote(text: &'static str, author: &'static str, category: &'static str) -> StaticQuote {
    StaticQuote {
        text,
        author,
        category,
    }
}

/// The built-in quote table. Read-only.
pub static QUOTES: &[StaticQuote] = &[
    quote("The only way to do great work is to love what you do.", "Steve Jobs", "motivation"),
    quote("Innovation distinguishes between a leader and a follower.", "Steve Jobs", "innovation"),
    quote("Stay hungry, stay foolish.", "Steve Jobs", "motivation"),
    quote("Life is what happens when you're busy making other plans.", "John Lennon", "life"),
    quote(
        "The future belongs to those who believe in the beauty of their dreams.",
        "Eleanor Roosevelt",
        "motivation",
    ),
    quote(
        "It is during our darkest moments that we must focus to see the light.",
        "Aristotle",
        "wisdom",
    ),
    quote("The only thing we have to fear is fear itself.", "Franklin D. Roosevelt", "courage"),
    quote("In the middle of difficulty lies opportunity.", "Albert Einstein", "wisdom"),
    quote("Imagination is more important than knowledge.", "Albert Einstein", "wisdom"),
    quote("Be the change you wish to see in the world.", "Mahatma Gandhi", "motivation"),
    quote(
        "An eye for an eye only ends up making the whole world blind.",
        "Mahatma Gandhi",
        "wisdom",
    ),
    quote(
        "The best time to plant a tree was 20 years ago. The second best time is now.",
        "Chinese Proverb",
        "wisdom",
    ),
    quote("Talk is cheap. Show me the code.", "Linus Torvalds", "programming"),
    quote("First, solve the problem. Then, write the code.", "John Johnson", "programming"),
    quote("Code is like humor. When you have to explain it, it's bad.", "Cory House", "programming"),
    quote("Simplicity is the soul of efficiency.", "Austin Freeman", "programming"),
    quote(
        "Any fool can write code that a computer can understand. Good programmers write code that humans can understand.",
        "Martin Fowler",
        "programming",
    ),
    quote(
        "The most damaging phrase in the language is: We've always done it this way.",
        "Grace Hopper",
        "innovation",
    ),
];

/// A quote as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Quote text.
    pub text: String,
    /// Attribution.
    pub author: String,
    /// Category, for quotes from the local table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl From<&StaticQuote> for Quote {
    fn from(quote: &StaticQuote) -> Self {
        Self {
            text: quote.text.to_string(),
            author: quote.author.to_string(),
            category: Some(quote.category.to_string()),
        }
    }
}

/// Local quotes in `category`, compared case-insensitively.
#[must_use]
pub fn quotes_in_category(category: &str) -> Vec<&'static StaticQuote> {
    let category = category.to_lowercase();
    QUOTES
        .iter()
        .filter(|q| q.category.to_lowercase() == category)
        .collect()
}

/// Clamps a requested result count into `1..=MAX_SEARCH_LIMIT`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // result is 1..=10
pub const fn effective_limit(requested: i64) -> usize {
    let limit = if requested <= 0 {
        DEFAULT_SEARCH_LIMIT
    } else if requested > MAX_SEARCH_LIMIT {
        MAX_SEARCH_LIMIT
    } else {
        requested
    };
    limit as usize
}

/// Local quotes whose text, author or category contains `query`.
#[must_use]
pub fn search(query: &str, limit: usize) -> Vec<Quote> {
    let query = query.to_lowercase();
    QUOTES
        .iter()
        .filter(|q| {
            q.text.to_lowercase().contains(&query)
                || q.author.to_lowercase().contains(&query)
                || q.category.to_lowercase().contains(&query)
        })
        .take(limit)
        .map(Quote::from)
        .collect()
}

/// Distinct categories of the local table, sorted.
#[must_use]
pub fn categories() -> Vec<String> {
    QUOTES
        .iter()
        .map(|q| q.category)
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
struct ZenQuote {
    q: String,
    a: String,
}

/// Input for `get_random_quote`.
#[derive(Debug, Deserialize)]
pub struct RandomQuoteInput {
    /// Optional category filter.
    #[serde(default)]
    pub category: Option<String>,
}

/// `get_random_quote`
#[derive(Debug, Clone)]
pub struct GetRandomQuote {
    upstream: UpstreamClient,
}

impl GetRandomQuote {
    /// Creates the handler over a ZenQuotes-compatible API.
    #[must_use]
    pub const fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    async fn fetch_remote(&self, ctx: &CallContext) -> Result<Quote, QuotesError> {
        let quotes: Vec<ZenQuote> = self.upstream.get_json(ctx, "/api/random", &[]).await?;
        let first = quotes.into_iter().next().ok_or(QuotesError::EmptyResponse)?;
        Ok(Quote {
            text: first.q,
            author: first.a,
            category: None,
        })
    }
}

fn pick_local(candidates: &[&'static StaticQuote], category: &str) -> Result<Quote, QuotesError> {
    candidates
        .choose(&mut rand::thread_rng())
        .map(|q| Quote::from(*q))
        .ok_or_else(|| QuotesError::NoQuotesForCategory {
            category: category.to_string(),
        })
}

impl ToolHandler for GetRandomQuote {
    type Input = RandomQuoteInput;
    type Output = Quote;
    type Error = QuotesError;

    async fn call(
        &self,
        ctx: &CallContext,
        input: RandomQuoteInput,
    ) -> Result<Quote, QuotesError> {
        if let Some(category) = input.category.as_deref().filter(|c| !c.trim().is_empty()) {
            let matches = quotes_in_category(category.trim());
            tracing::debug!(category, matches = matches.len(), "Filtering local quotes");
            return pick_local(&matches, category);
        }

        ctx.report_progress(0, Some(1), "Fetching quote from upstream");
        match self.fetch_remote(ctx).await {
            Ok(quote) => {
                tracing::debug!(author = %quote.author, "Quote fetched from upstream");
                Ok(quote)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Upstream quote unavailable, using local table");
                let all: Vec<_> = QUOTES.iter().collect();
                pick_local(&all, "")
            }
        }
    }
}

/// Input for `search_quotes`.
#[derive(Debug, Deserialize)]
pub struct SearchQuotesInput {
    /// Case-insensitive search term.
    pub query: String,
    /// Maximum results (clamped to 1..=10).
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    DEFAULT_SEARCH_LIMIT
}

/// Output of `search_quotes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuotesOutput {
    /// Matching quotes, in table order.
    pub quotes: Vec<Quote>,
    /// Number of quotes returned.
    pub total: usize,
}

/// `search_quotes`
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchQuotes;

impl ToolHandler for SearchQuotes {
    type Input = SearchQuotesInput;
    type Output = SearchQuotesOutput;
    type Error = QuotesError;

    async fn call(
        &self,
        _ctx: &CallContext,
        input: SearchQuotesInput,
    ) -> Result<SearchQuotesOutput, QuotesError> {
        let limit = effective_limit(input.limit);
        let quotes = search(&input.query, limit);
        tracing::debug!(query = %input.query, limit, found = quotes.len(), "Search completed");
        Ok(SearchQuotesOutput {
            total: quotes.len(),
            quotes,
        })
    }
}

/// Input for `list_categories` (no arguments).
#[derive(Debug, Default, Deserialize)]
pub struct NoArguments {}

/// Output of `list_categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoriesOutput {
    /// Sorted, distinct category names.
    pub categories: Vec<String>,
}

/// `list_categories`
#[derive(Debug, Clone, Copy, Default)]
pub struct ListCategories;

impl ToolHandler for ListCategories {
    type Input = NoArguments;
    type Output = CategoriesOutput;
    type Error = QuotesError;

    async fn call(
        &self,
        _ctx: &CallContext,
        _input: NoArguments,
    ) -> Result<CategoriesOutput, QuotesError> {
        Ok(CategoriesOutput {
            categories: categories(),
        })
    }
}

/// Registers the quote tools.
///
/// # Errors
///
/// Returns an error if a tool name is already taken.
pub fn register(
    registry: &mut ToolRegistry,
    upstream: UpstreamClient,
) -> Result<(), RegistryError> {
    registry.register(
        "get_random_quote",
        "Get a random inspirational quote, optionally filtered by category.",
        json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "description": "filter by category: motivation, wisdom, programming, innovation, life, courage"
                }
            }
        }),
        GetRandomQuote::new(upstream),
    )?;

    registry.register(
        "search_quotes",
        "Search for quotes by keyword in the quote text, author name, or category.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "minLength": 1,
                    "description": "search term to find in quotes or author names"
                },
                "limit": {
                    "type": "integer",
                    "default": DEFAULT_SEARCH_LIMIT,
                    "description": "maximum number of results (default 5, max 10)"
                }
            },
            "required": ["query"]
        }),
        SearchQuotes,
    )?;

    registry.register(
        "list_categories",
        "List all available quote categories.",
        json!({
            "type": "object",
            "properties": {}
        }),
        ListCategories,
    )?;

    Ok(())
}

//! Integration tests for the quote tool set.
//!
//! The ZenQuotes API is replaced by a mockito server; the local table is
//! exercised directly.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mcp_http_tools::config::UpstreamConfig;
use mcp_http_tools::error::ToolError;
use mcp_http_tools::mcp::dispatcher::{Dispatcher, ServerInfo};
use mcp_http_tools::mcp::protocol::RequestId;
use mcp_http_tools::mcp::CallContext;
use mcp_http_tools::tools::ToolSet;

fn dispatcher(base_url: &str) -> Dispatcher {
    dispatcher_with_timeout(base_url, 2)
}

fn dispatcher_with_timeout(base_url: &str, timeout_secs: u64) -> Dispatcher {
    let upstream = UpstreamConfig {
        base_url: Some(base_url.to_string()),
        timeout_secs: Some(timeout_secs),
    };
    let registry = ToolSet::Quotes.build_registry(&upstream).unwrap();
    Dispatcher::new(registry, ServerInfo::new(ToolSet::Quotes.server_name()))
}

/// Accepts connections and never answers them.
async fn silent_upstream() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    (format!("http://{addr}"), task)
}

fn ctx() -> CallContext {
    CallContext::new(RequestId::Number(1))
}

const LOCAL_AUTHORS: &[&str] = &[
    "Steve Jobs",
    "John Lennon",
    "Eleanor Roosevelt",
    "Aristotle",
    "Franklin D. Roosevelt",
    "Albert Einstein",
    "Mahatma Gandhi",
    "Chinese Proverb",
    "Linus Torvalds",
    "John Johnson",
    "Cory House",
    "Austin Freeman",
    "Martin Fowler",
    "Grace Hopper",
];

// =============================================================================
// get_random_quote
// =============================================================================

#[tokio::test]
async fn test_random_quote_from_upstream() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/random")
        .with_header("content-type", "application/json")
        .with_body(r#"[{"q": "Well begun is half done.", "a": "Aristotle", "h": "<blockquote/>"}]"#)
        .create_async()
        .await;

    let out = dispatcher(&server.url())
        .call_tool("get_random_quote", json!({}), &ctx())
        .await
        .unwrap();

    assert_eq!(
        out,
        json!({ "text": "Well begun is half done.", "author": "Aristotle" })
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_random_quote_falls_back_on_error_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/random")
        .with_status(500)
        .create_async()
        .await;

    let out = dispatcher(&server.url())
        .call_tool("get_random_quote", Value::Null, &ctx())
        .await
        .unwrap();

    assert!(LOCAL_AUTHORS.contains(&out["author"].as_str().unwrap()));
    assert!(out["category"].is_string());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_random_quote_falls_back_on_empty_list() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/random")
        .with_body("[]")
        .create_async()
        .await;

    let out = dispatcher(&server.url())
        .call_tool("get_random_quote", json!({}), &ctx())
        .await
        .unwrap();
    assert!(LOCAL_AUTHORS.contains(&out["author"].as_str().unwrap()));
}

#[tokio::test]
async fn test_random_quote_falls_back_when_unreachable() {
    let out = dispatcher("http://127.0.0.1:9")
        .call_tool("get_random_quote", json!({}), &ctx())
        .await
        .unwrap();
    assert!(LOCAL_AUTHORS.contains(&out["author"].as_str().unwrap()));
}

#[tokio::test]
async fn test_random_quote_falls_back_on_timeout() {
    let (base_url, _listener) = silent_upstream().await;

    let started = Instant::now();
    let out = dispatcher_with_timeout(&base_url, 1)
        .call_tool("get_random_quote", json!({}), &ctx())
        .await
        .unwrap();

    assert!(LOCAL_AUTHORS.contains(&out["author"].as_str().unwrap()));
    assert!(out["category"].is_string());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
}

#[tokio::test]
async fn test_category_filters_without_upstream() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/random")
        .expect(0)
        .create_async()
        .await;

    let dispatcher = dispatcher(&server.url());
    for _ in 0..10 {
        let out = dispatcher
            .call_tool("get_random_quote", json!({ "category": "Programming" }), &ctx())
            .await
            .unwrap();
        assert_eq!(out["category"], "programming");
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_category() {
    let err = dispatcher("http://127.0.0.1:9")
        .call_tool("get_random_quote", json!({ "category": "astrology" }), &ctx())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ToolError::HandlerFailed {
            message: "no quotes found for category: astrology".to_string()
        }
    );
}

// =============================================================================
// search_quotes / list_categories
// =============================================================================

#[tokio::test]
async fn test_search_by_author() {
    let out = dispatcher("http://127.0.0.1:9")
        .call_tool("search_quotes", json!({ "query": "EINSTEIN" }), &ctx())
        .await
        .unwrap();

    assert_eq!(out["total"], 2);
    for quote in out["quotes"].as_array().unwrap() {
        assert_eq!(quote["author"], "Albert Einstein");
        assert_eq!(quote["category"], "wisdom");
    }
}

#[tokio::test]
async fn test_search_limit_bounds() {
    let dispatcher = dispatcher("http://127.0.0.1:9");

    let zero = dispatcher
        .call_tool("search_quotes", json!({ "query": "the", "limit": 0 }), &ctx())
        .await
        .unwrap();
    assert_eq!(zero["total"], 5);

    let two = dispatcher
        .call_tool("search_quotes", json!({ "query": "the", "limit": 2 }), &ctx())
        .await
        .unwrap();
    assert_eq!(two["total"], 2);
}

#[tokio::test]
async fn test_search_limit_as_float() {
    let dispatcher = dispatcher("http://127.0.0.1:9");

    let out = dispatcher
        .call_tool("search_quotes", json!({ "query": "the", "limit": 2.0 }), &ctx())
        .await
        .unwrap();
    assert_eq!(out["total"], 2);

    let err = dispatcher
        .call_tool("search_quotes", json!({ "query": "the", "limit": 1e300 }), &ctx())
        .await
        .unwrap_err();
    assert!(matches!(&err, ToolError::InvalidArguments { field: Some(f), .. } if f == "limit"));
}

#[tokio::test]
async fn test_search_no_match() {
    let out = dispatcher("http://127.0.0.1:9")
        .call_tool("search_quotes", json!({ "query": "zzzz" }), &ctx())
        .await
        .unwrap();
    assert_eq!(out, json!({ "quotes": [], "total": 0 }));
}

#[tokio::test]
async fn test_search_rejects_empty_query() {
    let err = dispatcher("http://127.0.0.1:9")
        .call_tool("search_quotes", json!({ "query": "" }), &ctx())
        .await
        .unwrap_err();
    assert!(matches!(&err, ToolError::InvalidArguments { field: Some(f), .. } if f == "query"));
}

#[tokio::test]
async fn test_list_categories() {
    let out = dispatcher("http://127.0.0.1:9")
        .call_tool("list_categories", json!({}), &ctx())
        .await
        .unwrap();
    assert_eq!(
        out["categories"],
        json!(["courage", "innovation", "life", "motivation", "programming", "wisdom"])
    );
}

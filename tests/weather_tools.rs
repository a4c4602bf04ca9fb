//! Integration tests for the weather tool set against a mock Open-Meteo API.

use std::time::{Duration, Instant};

use mockito::Matcher;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mcp_http_tools::config::UpstreamConfig;
use mcp_http_tools::error::ToolError;
use mcp_http_tools::mcp::dispatcher::{Dispatcher, ServerInfo};
use mcp_http_tools::mcp::protocol::RequestId;
use mcp_http_tools::mcp::CallContext;
use mcp_http_tools::tools::weather::ForecastOutput;
use mcp_http_tools::tools::ToolSet;

const CURRENT_BODY: &str = r#"{
    "latitude": 52.52,
    "longitude": 13.419998,
    "generationtime_ms": 0.05,
    "current_weather": {
        "time": "2025-01-15T12:00",
        "interval": 900,
        "temperature": 3.4,
        "windspeed": 14.8,
        "winddirection": 247,
        "is_day": 1,
        "weathercode": 61
    }
}"#;

const FORECAST_BODY: &str = r#"{
    "latitude": 52.52,
    "longitude": 13.419998,
    "daily": {
        "time": ["2025-01-15", "2025-01-16", "2025-01-17"],
        "temperature_2m_max": [4.1, 2.0, -0.5],
        "temperature_2m_min": [-1.2, -3.3, -6.0],
        "weathercode": [61, 3, 73],
        "precipitation_sum": [2.4, 0.0, null]
    }
}"#;

fn dispatcher(base_url: &str) -> Dispatcher {
    dispatcher_with_timeout(base_url, 2)
}

fn dispatcher_with_timeout(base_url: &str, timeout_secs: u64) -> Dispatcher {
    let upstream = UpstreamConfig {
        base_url: Some(base_url.to_string()),
        timeout_secs: Some(timeout_secs),
    };
    let registry = ToolSet::Weather.build_registry(&upstream).unwrap();
    Dispatcher::new(registry, ServerInfo::new(ToolSet::Weather.server_name()))
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

fn handler_message(err: ToolError) -> String {
    match err {
        ToolError::HandlerFailed { message } => message,
        other => panic!("expected handler failure, got {other:?}"),
    }
}

// =============================================================================
// get_current_weather
// =============================================================================

#[tokio::test]
async fn test_current_weather() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("latitude".into(), "52.520000".into()),
            Matcher::UrlEncoded("longitude".into(), "13.410000".into()),
            Matcher::UrlEncoded("current_weather".into(), "true".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(CURRENT_BODY)
        .create_async()
        .await;

    let out = dispatcher(&server.url())
        .call_tool(
            "get_current_weather",
            json!({ "latitude": 52.52, "longitude": 13.41 }),
            &ctx(),
        )
        .await
        .unwrap();

    assert_eq!(
        out,
        json!({
            "latitude": 52.52,
            "longitude": 13.419998,
            "temperature_celsius": 3.4,
            "wind_speed_kmh": 14.8,
            "wind_direction_degrees": 247,
            "weather_code": 61,
            "description": "Slight rain",
            "is_day": true,
            "time": "2025-01-15T12:00"
        })
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_current_weather_status_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let err = dispatcher(&server.url())
        .call_tool(
            "get_current_weather",
            json!({ "latitude": 0, "longitude": 0 }),
            &ctx(),
        )
        .await
        .unwrap_err();
    assert_eq!(handler_message(err), "API returned status 500");
}

#[tokio::test]
async fn test_latitude_out_of_range_never_calls_upstream() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = dispatcher(&server.url())
        .call_tool(
            "get_current_weather",
            json!({ "latitude": 91, "longitude": 0 }),
            &ctx(),
        )
        .await
        .unwrap_err();
    assert!(matches!(&err, ToolError::InvalidArguments { field: Some(f), .. } if f == "latitude"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_longitude() {
    let err = dispatcher("http://127.0.0.1:9")
        .call_tool("get_current_weather", json!({ "latitude": 10 }), &ctx())
        .await
        .unwrap_err();
    assert!(matches!(&err, ToolError::InvalidArguments { field: Some(f), .. } if f == "longitude"));
}

#[tokio::test]
async fn test_cancelled_call_skips_upstream() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let token = CancellationToken::new();
    token.cancel();
    let ctx = ctx().with_cancellation(token);

    let err = dispatcher(&server.url())
        .call_tool(
            "get_current_weather",
            json!({ "latitude": 1, "longitude": 1 }),
            &ctx,
        )
        .await
        .unwrap_err();
    assert_eq!(
        handler_message(err),
        "failed to fetch weather data: request cancelled"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_silent_upstream_times_out() {
    let (base_url, _listener) = silent_upstream().await;

    let started = Instant::now();
    let err = dispatcher_with_timeout(&base_url, 1)
        .call_tool(
            "get_current_weather",
            json!({ "latitude": 1, "longitude": 1 }),
            &ctx(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        handler_message(err),
        "failed to fetch weather data: request timed out after 1s"
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

// =============================================================================
// get_forecast
// =============================================================================

#[tokio::test]
async fn test_forecast_defaults_to_three_days() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("forecast_days".into(), "3".into()),
            Matcher::UrlEncoded("timezone".into(), "auto".into()),
            Matcher::UrlEncoded(
                "daily".into(),
                "temperature_2m_max,temperature_2m_min,weathercode,precipitation_sum".into(),
            ),
        ]))
        .with_header("content-type", "application/json")
        .with_body(FORECAST_BODY)
        .create_async()
        .await;

    let out = dispatcher(&server.url())
        .call_tool(
            "get_forecast",
            json!({ "latitude": 52.52, "longitude": 13.41 }),
            &ctx(),
        )
        .await
        .unwrap();
    mock.assert_async().await;

    let forecast: ForecastOutput = serde_json::from_value(out).unwrap();
    assert_eq!(forecast.daily.len(), 3);
    assert_eq!(forecast.daily[0].date, "2025-01-15");
    assert_eq!(forecast.daily[0].description, "Slight rain");
    assert!((forecast.daily[0].precipitation_mm - 2.4).abs() < 1e-9);
    assert_eq!(forecast.daily[1].description, "Overcast");
    assert_eq!(forecast.daily[2].description, "Moderate snow");
    assert!(forecast.daily[2].precipitation_mm.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_forecast_days_clamped() {
    let mut server = mockito::Server::new_async().await;
    let seven = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::UrlEncoded("forecast_days".into(), "7".into()))
        .with_body(FORECAST_BODY)
        .create_async()
        .await;
    let dispatcher = dispatcher(&server.url());

    dispatcher
        .call_tool(
            "get_forecast",
            json!({ "latitude": 0, "longitude": 0, "days": 14 }),
            &ctx(),
        )
        .await
        .unwrap();
    seven.assert_async().await;

    let three = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::UrlEncoded("forecast_days".into(), "3".into()))
        .with_body(FORECAST_BODY)
        .create_async()
        .await;
    dispatcher
        .call_tool(
            "get_forecast",
            json!({ "latitude": 0, "longitude": 0, "days": 0 }),
            &ctx(),
        )
        .await
        .unwrap();
    three.assert_async().await;
}

#[tokio::test]
async fn test_forecast_bad_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/forecast")
        .match_query(Matcher::Any)
        .with_body(r#"{"unexpected": true}"#)
        .create_async()
        .await;

    let err = dispatcher(&server.url())
        .call_tool(
            "get_forecast",
            json!({ "latitude": 0, "longitude": 0 }),
            &ctx(),
        )
        .await
        .unwrap_err();
    assert!(handler_message(err).starts_with("failed to parse API response"));
}

#[tokio::test]
async fn test_days_must_be_integer() {
    let err = dispatcher("http://127.0.0.1:9")
        .call_tool(
            "get_forecast",
            json!({ "latitude": 0, "longitude": 0, "days": "week" }),
            &ctx(),
        )
        .await
        .unwrap_err();
    assert!(matches!(&err, ToolError::InvalidArguments { field: Some(f), .. } if f == "days"));
}

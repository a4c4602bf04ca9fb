//! Weather tools backed by the Open-Meteo forecast API.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::error::RegistryError;
use crate::mcp::context::CallContext;
use crate::mcp::registry::{ToolHandler, ToolRegistry};
use crate::tools::upstream::{UpstreamClient, UpstreamError};

/// Forecast length when `days` is absent or not positive.
pub const DEFAULT_FORECAST_DAYS: i64 = 3;

/// Longest forecast Open-Meteo is asked for.
pub const MAX_FORECAST_DAYS: i64 = 7;

const FORECAST_PATH: &str = "/v1/forecast";

/// Errors from the weather tools.
///
/// Failures to reach the API carry a prefix naming what was being fetched.
/// A bad status or body from an API that did answer is reported bare.
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Current conditions could not be fetched.
    #[error("failed to fetch weather data: {0}")]
    Current(#[source] UpstreamError),

    /// The forecast could not be fetched.
    #[error("failed to fetch forecast data: {0}")]
    Forecast(#[source] UpstreamError),

    /// The API answered, but not with usable data.
    #[error(transparent)]
    Response(UpstreamError),
}

impl WeatherError {
    fn current(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Status { .. } | UpstreamError::Decode { .. } => Self::Response(error),
            other => Self::Current(other),
        }
    }

    fn forecast(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Status { .. } | UpstreamError::Decode { .. } => Self::Response(error),
            other => Self::Forecast(other),
        }
    }
}

/// Describes a WMO weather interpretation code.
#[must_use]
pub const fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

/// Clamps a requested forecast length into `1..=MAX_FORECAST_DAYS`.
#[must_use]
pub const fn effective_days(requested: i64) -> i64 {
    if requested <= 0 {
        DEFAULT_FORECAST_DAYS
    } else if requested > MAX_FORECAST_DAYS {
        MAX_FORECAST_DAYS
    } else {
        requested
    }
}

fn coordinate(value: f64) -> String {
    format!("{value:.6}")
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    latitude: f64,
    longitude: f64,
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    winddirection: f64,
    weathercode: i64,
    #[serde(default)]
    is_day: i64,
    time: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    daily: DailySeries,
}

#[derive(Debug, Deserialize)]
struct DailySeries {
    time: Vec<String>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
    weathercode: Vec<i64>,
    precipitation_sum: Vec<Option<f64>>,
}

/// Input for `get_current_weather`. Ranges are enforced by the input schema.
#[derive(Debug, Deserialize)]
pub struct CurrentWeatherInput {
    /// -90..=90
    pub latitude: f64,
    /// -180..=180
    pub longitude: f64,
}

/// Output of `get_current_weather`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeatherOutput {
    /// Grid latitude used by the API.
    pub latitude: f64,
    /// Grid longitude used by the API.
    pub longitude: f64,
    /// Air temperature.
    pub temperature_celsius: f64,
    /// Wind speed.
    pub wind_speed_kmh: f64,
    /// Wind direction.
    pub wind_direction_degrees: i64,
    /// WMO weather code.
    pub weather_code: i64,
    /// Human-readable weather code.
    pub description: String,
    /// Daylight at the location.
    pub is_day: bool,
    /// Observation time (ISO 8601, local to the API).
    pub time: String,
}

/// `get_current_weather`
#[derive(Debug, Clone)]
pub struct GetCurrentWeather {
    upstream: UpstreamClient,
}

impl GetCurrentWeather {
    /// Creates the handler over an Open-Meteo-compatible API.
    #[must_use]
    pub const fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

impl ToolHandler for GetCurrentWeather {
    type Input = CurrentWeatherInput;
    type Output = CurrentWeatherOutput;
    type Error = WeatherError;

    async fn call(
        &self,
        ctx: &CallContext,
        input: CurrentWeatherInput,
    ) -> Result<CurrentWeatherOutput, WeatherError> {
        ctx.report_progress(0, Some(1), "Fetching current weather");
        let response: CurrentResponse = self
            .upstream
            .get_json(
                ctx,
                FORECAST_PATH,
                &[
                    ("latitude", coordinate(input.latitude)),
                    ("longitude", coordinate(input.longitude)),
                    ("current_weather", "true".to_string()),
                ],
            )
            .await
            .map_err(WeatherError::current)?;
        ctx.report_progress(1, Some(1), "Weather received");

        let current = response.current_weather;
        #[allow(clippy::cast_possible_truncation)] // degrees are 0..=360
        let wind_direction = current.winddirection.round() as i64;
        let output = CurrentWeatherOutput {
            latitude: response.latitude,
            longitude: response.longitude,
            temperature_celsius: current.temperature,
            wind_speed_kmh: current.windspeed,
            wind_direction_degrees: wind_direction,
            weather_code: current.weathercode,
            description: describe_weather_code(current.weathercode).to_string(),
            is_day: current.is_day == 1,
            time: current.time,
        };
        tracing::debug!(
            temperature = output.temperature_celsius,
            description = %output.description,
            "Current weather retrieved"
        );
        Ok(output)
    }
}

/// Input for `get_forecast`.
#[derive(Debug, Deserialize)]
pub struct ForecastInput {
    /// -90..=90
    pub latitude: f64,
    /// -180..=180
    pub longitude: f64,
    /// Forecast length (clamped to 1..=7).
    #[serde(default = "default_days")]
    pub days: i64,
}

const fn default_days() -> i64 {
    DEFAULT_FORECAST_DAYS
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// `YYYY-MM-DD`, local to the location.
    pub date: String,
    /// Daily maximum.
    pub temp_max_celsius: f64,
    /// Daily minimum.
    pub temp_min_celsius: f64,
    /// WMO weather code.
    pub weather_code: i64,
    /// Human-readable weather code.
    pub description: String,
    /// Precipitation total.
    pub precipitation_mm: f64,
}

/// Output of `get_forecast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    /// Grid latitude used by the API.
    pub latitude: f64,
    /// Grid longitude used by the API.
    pub longitude: f64,
    /// One entry per forecast day.
    pub daily: Vec<DailyForecast>,
}

fn daily_forecasts(series: DailySeries) -> Vec<DailyForecast> {
    series
        .time
        .into_iter()
        .zip(series.temperature_2m_max)
        .zip(series.temperature_2m_min)
        .zip(series.weathercode)
        .zip(series.precipitation_sum)
        .map(|((((date, max), min), code), precipitation)| DailyForecast {
            date,
            temp_max_celsius: max,
            temp_min_celsius: min,
            weather_code: code,
            description: describe_weather_code(code).to_string(),
            precipitation_mm: precipitation.unwrap_or(0.0),
        })
        .collect()
}

/// `get_forecast`
#[derive(Debug, Clone)]
pub struct GetForecast {
    upstream: UpstreamClient,
}

impl GetForecast {
    /// Creates the handler over an Open-Meteo-compatible API.
    #[must_use]
    pub const fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

impl ToolHandler for GetForecast {
    type Input = ForecastInput;
    type Output = ForecastOutput;
    type Error = WeatherError;

    async fn call(
        &self,
        ctx: &CallContext,
        input: ForecastInput,
    ) -> Result<ForecastOutput, WeatherError> {
        let days = effective_days(input.days);
        ctx.report_progress(0, Some(1), "Fetching forecast");
        let response: ForecastResponse = self
            .upstream
            .get_json(
                ctx,
                FORECAST_PATH,
                &[
                    ("latitude", coordinate(input.latitude)),
                    ("longitude", coordinate(input.longitude)),
                    (
                        "daily",
                        "temperature_2m_max,temperature_2m_min,weathercode,precipitation_sum"
                            .to_string(),
                    ),
                    ("forecast_days", days.to_string()),
                    ("timezone", "auto".to_string()),
                ],
            )
            .await
            .map_err(WeatherError::forecast)?;
        ctx.report_progress(1, Some(1), "Forecast received");

        let daily = daily_forecasts(response.daily);
        tracing::debug!(days = daily.len(), "Forecast retrieved");
        Ok(ForecastOutput {
            latitude: response.latitude,
            longitude: response.longitude,
            daily,
        })
    }
}

fn coordinates_schema(extra: Option<(&str, serde_json::Value)>) -> serde_json::Value {
    let mut schema = json!({
        "type": "object",
        "properties": {
            "latitude": {
                "type": "number",
                "minimum": -90,
                "maximum": 90,
                "description": "latitude coordinate (-90 to 90)"
            },
            "longitude": {
                "type": "number",
                "minimum": -180,
                "maximum": 180,
                "description": "longitude coordinate (-180 to 180)"
            }
        },
        "required": ["latitude", "longitude"]
    });
    if let Some((name, property)) = extra {
        schema["properties"][name] = property;
    }
    schema
}

/// Registers the weather tools.
///
/// # Errors
///
/// Returns an error if a tool name is already taken.
pub fn register(
    registry: &mut ToolRegistry,
    upstream: UpstreamClient,
) -> Result<(), RegistryError> {
    registry.register(
        "get_current_weather",
        "Get current weather conditions for a location specified by latitude and longitude coordinates.",
        coordinates_schema(None),
        GetCurrentWeather::new(upstream.clone()),
    )?;

    registry.register(
        "get_forecast",
        "Get weather forecast for a location. Returns daily forecasts including temperature range, weather conditions, and precipitation.",
        coordinates_schema(Some((
            "days",
            json!({
                "type": "integer",
                "default": DEFAULT_FORECAST_DAYS,
                "description": "number of forecast days (1-7, default 3)"
            }),
        ))),
        GetForecast::new(upstream),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_are_described() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(63), "Moderate rain");
        assert_eq!(describe_weather_code(99), "Thunderstorm with heavy hail");
    }

    #[test]
    fn unknown_codes() {
        assert_eq!(describe_weather_code(4), "Unknown");
        assert_eq!(describe_weather_code(-1), "Unknown");
    }

    #[test]
    fn days_are_clamped() {
        assert_eq!(effective_days(0), 3);
        assert_eq!(effective_days(-2), 3);
        assert_eq!(effective_days(5), 5);
        assert_eq!(effective_days(14), 7);
    }

    #[test]
    fn coordinates_use_six_decimals() {
        assert_eq!(coordinate(52.52), "52.520000");
        assert_eq!(coordinate(-0.1), "-0.100000");
    }

    #[test]
    fn ragged_series_is_truncated() {
        let series = DailySeries {
            time: vec!["2025-01-01".to_string(), "2025-01-02".to_string()],
            temperature_2m_max: vec![5.0],
            temperature_2m_min: vec![-1.0, 0.0],
            weathercode: vec![3, 61],
            precipitation_sum: vec![None, Some(2.5)],
        };
        let daily = daily_forecasts(series);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].description, "Overcast");
        assert!(daily[0].precipitation_mm.abs() < f64::EPSILON);
    }

    #[test]
    fn error_prefixes() {
        let status = || UpstreamError::Status { status: 503 };
        assert_eq!(WeatherError::current(status()).to_string(), "API returned status 503");
        assert_eq!(WeatherError::forecast(status()).to_string(), "API returned status 503");
        assert_eq!(
            WeatherError::current(UpstreamError::Timeout { secs: 10 }).to_string(),
            "failed to fetch weather data: request timed out after 10s"
        );
        assert_eq!(
            WeatherError::forecast(UpstreamError::Cancelled).to_string(),
            "failed to fetch forecast data: request cancelled"
        );
    }

    #[test]
    fn forecast_schema_declares_days_default() {
        let schema = coordinates_schema(Some(("days", json!({"type": "integer", "default": 3}))));
        assert_eq!(schema["properties"]["days"]["default"], 3);
        assert_eq!(schema["required"], json!(["latitude", "longitude"]));
    }
}

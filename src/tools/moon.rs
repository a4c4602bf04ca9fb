//! Moon phase tools.
//!
//! Phases are computed from the mean synodic month relative to a known new
//! moon, which is accurate to within about a day. No network access.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::error::RegistryError;
use crate::mcp::context::CallContext;
use crate::mcp::registry::{ToolHandler, ToolRegistry};

/// Mean length of a lunar cycle, in days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_67;

/// Date format accepted and produced by the moon tools.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors from the moon tools.
#[derive(Error, Debug)]
pub enum MoonError {
    /// The `date` argument is not a calendar date.
    #[error("invalid date format, use YYYY-MM-DD: {0}")]
    InvalidDate(#[from] chrono::ParseError),

    /// The requested month cannot be represented.
    #[error("no such month: {year}-{month:02}")]
    InvalidMonth {
        /// Requested year.
        year: i32,
        /// Requested month.
        month: u32,
    },
}

/// The eight named phases of the lunar cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 🌑
    NewMoon,
    /// 🌒
    WaxingCrescent,
    /// 🌓
    FirstQuarter,
    /// 🌔
    WaxingGibbous,
    /// 🌕
    FullMoon,
    /// 🌖
    WaningGibbous,
    /// 🌗
    LastQuarter,
    /// 🌘
    WaningCrescent,
}

impl Phase {
    /// Classifies a position in the cycle (0 = new, 0.5 = full).
    #[must_use]
    pub fn from_position(position: f64) -> Self {
        match position {
            p if p < 0.0625 => Self::NewMoon,
            p if p < 0.1875 => Self::WaxingCrescent,
            p if p < 0.3125 => Self::FirstQuarter,
            p if p < 0.4375 => Self::WaxingGibbous,
            p if p < 0.5625 => Self::FullMoon,
            p if p < 0.6875 => Self::WaningGibbous,
            p if p < 0.8125 => Self::LastQuarter,
            p if p < 0.9375 => Self::WaningCrescent,
            _ => Self::NewMoon,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NewMoon => "New Moon",
            Self::WaxingCrescent => "Waxing Crescent",
            Self::FirstQuarter => "First Quarter",
            Self::WaxingGibbous => "Waxing Gibbous",
            Self::FullMoon => "Full Moon",
            Self::WaningGibbous => "Waning Gibbous",
            Self::LastQuarter => "Last Quarter",
            Self::WaningCrescent => "Waning Crescent",
        }
    }

    /// Emoji glyph.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::NewMoon => "🌑",
            Self::WaxingCrescent => "🌒",
            Self::FirstQuarter => "🌓",
            Self::WaxingGibbous => "🌔",
            Self::FullMoon => "🌕",
            Self::WaningGibbous => "🌖",
            Self::LastQuarter => "🌗",
            Self::WaningCrescent => "🌘",
        }
    }
}

/// 2000-01-06 18:14 UTC.
fn reference_new_moon() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2000, 1, 6)
        .and_then(|d| d.and_hms_opt(18, 14, 0))
        .map_or(DateTime::UNIX_EPOCH, |dt| dt.and_utc())
}

/// Position in the lunar cycle at `at`, in `[0, 1)`.
#[must_use]
pub fn cycle_position(at: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)] // seconds since 2000 fit comfortably in f64
    let days = (at - reference_new_moon()).num_seconds() as f64 / 86_400.0;
    let position = (days / SYNODIC_MONTH_DAYS).fract();
    if position < 0.0 {
        position + 1.0
    } else {
        position
    }
}

/// Illuminated fraction as a percentage (0 at new moon, 100 at full).
#[must_use]
pub fn illumination(position: f64) -> f64 {
    let fraction = if position < 0.5 {
        position * 2.0
    } else {
        (1.0 - position) * 2.0
    };
    fraction * 100.0
}

/// Whole days until the next full moon.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // 0 <= days < 30
pub fn days_until_full(position: f64) -> u32 {
    let mut days = (0.5 - position) * SYNODIC_MONTH_DAYS;
    if days < 0.0 {
        days += SYNODIC_MONTH_DAYS;
    }
    days as u32
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Input for `get_moon_phase`.
#[derive(Debug, Deserialize)]
pub struct MoonPhaseInput {
    /// `YYYY-MM-DD`; today when absent.
    #[serde(default)]
    pub date: Option<String>,
}

/// Output of `get_moon_phase`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoonPhaseOutput {
    /// The date the phase was computed for.
    pub date: String,
    /// Phase name.
    pub phase: String,
    /// Illuminated percentage.
    pub illumination: f64,
    /// Whole days until the next full moon.
    pub days_until_full: u32,
    /// Phase glyph.
    pub emoji: String,
}

/// Computes the phase report for one instant.
#[must_use]
pub fn moon_phase_at(at: DateTime<Utc>) -> MoonPhaseOutput {
    let position = cycle_position(at);
    let phase = Phase::from_position(position);
    MoonPhaseOutput {
        date: at.format(DATE_FORMAT).to_string(),
        phase: phase.name().to_string(),
        illumination: illumination(position),
        days_until_full: days_until_full(position),
        emoji: phase.emoji().to_string(),
    }
}

/// `get_moon_phase`
#[derive(Debug, Clone, Copy, Default)]
pub struct GetMoonPhase;

impl ToolHandler for GetMoonPhase {
    type Input = MoonPhaseInput;
    type Output = MoonPhaseOutput;
    type Error = MoonError;

    async fn call(
        &self,
        _ctx: &CallContext,
        input: MoonPhaseInput,
    ) -> Result<MoonPhaseOutput, MoonError> {
        let at = match input.date.as_deref().filter(|d| !d.is_empty()) {
            Some(date) => midnight(NaiveDate::parse_from_str(date, DATE_FORMAT)?),
            None => Utc::now(),
        };
        let output = moon_phase_at(at);
        tracing::debug!(
            date = %output.date,
            phase = %output.phase,
            illumination = output.illumination,
            "Moon phase calculated"
        );
        Ok(output)
    }
}

/// Input for `get_moon_calendar`. Ranges are enforced by the input schema.
#[derive(Debug, Deserialize)]
pub struct MoonCalendarInput {
    /// 1..=12
    pub month: u32,
    /// 1900..=2100
    pub year: i32,
}

/// Output of `get_moon_calendar`. Dates are empty when the phase does not
/// begin within the month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoonCalendarOutput {
    /// Requested month.
    pub month: u32,
    /// Requested year.
    pub year: i32,
    /// First day a new moon begins.
    pub new_moon: String,
    /// First day a first quarter begins.
    pub first_quarter: String,
    /// First day a full moon begins.
    pub full_moon: String,
    /// First day a last quarter begins.
    pub last_quarter: String,
}

/// Finds the first day in the month on which each principal phase begins.
///
/// # Errors
///
/// Returns [`MoonError::InvalidMonth`] if the month does not exist.
pub fn moon_calendar(year: i32, month: u32) -> Result<MoonCalendarOutput, MoonError> {
    let invalid = || MoonError::InvalidMonth { year, month };
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = start
        .checked_add_months(chrono::Months::new(1))
        .ok_or_else(invalid)?;

    let mut output = MoonCalendarOutput {
        month,
        year,
        new_moon: String::new(),
        first_quarter: String::new(),
        full_moon: String::new(),
        last_quarter: String::new(),
    };

    let mut previous = Phase::from_position(cycle_position(midnight(start) - Duration::days(1)));
    for day in start.iter_days().take_while(|d| *d < end) {
        let phase = Phase::from_position(cycle_position(midnight(day)));
        if phase != previous {
            let slot = match phase {
                Phase::NewMoon => Some(&mut output.new_moon),
                Phase::FirstQuarter => Some(&mut output.first_quarter),
                Phase::FullMoon => Some(&mut output.full_moon),
                Phase::LastQuarter => Some(&mut output.last_quarter),
                _ => None,
            };
            if let Some(slot) = slot.filter(|s| s.is_empty()) {
                *slot = day.format(DATE_FORMAT).to_string();
            }
        }
        previous = phase;
    }
    Ok(output)
}

/// `get_moon_calendar`
#[derive(Debug, Clone, Copy, Default)]
pub struct GetMoonCalendar;

impl ToolHandler for GetMoonCalendar {
    type Input = MoonCalendarInput;
    type Output = MoonCalendarOutput;
    type Error = MoonError;

    async fn call(
        &self,
        _ctx: &CallContext,
        input: MoonCalendarInput,
    ) -> Result<MoonCalendarOutput, MoonError> {
        let output = moon_calendar(input.year, input.month)?;
        tracing::debug!(
            year = output.year,
            month = output.month,
            full_moon = %output.full_moon,
            "Moon calendar calculated"
        );
        Ok(output)
    }
}

/// Registers the moon tools.
///
/// # Errors
///
/// Returns an error if a tool name is already taken.
pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        "get_moon_phase",
        "Get the current moon phase for a specific date. Returns phase name, illumination percentage, days until full moon, and emoji.",
        json!({
            "type": "object",
            "properties": {
                "date": {
                    "type": "string",
                    "description": "date in YYYY-MM-DD format, defaults to today"
                }
            }
        }),
        GetMoonPhase,
    )?;

    registry.register(
        "get_moon_calendar",
        "Get the moon phase calendar for a specific month, showing dates of new moon, first quarter, full moon, and last quarter.",
        json!({
            "type": "object",
            "properties": {
                "month": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 12,
                    "description": "month number (1-12)"
                },
                "year": {
                    "type": "integer",
                    "minimum": 1900,
                    "maximum": 2100,
                    "description": "year (e.g., 2025)"
                }
            },
            "required": ["month", "year"]
        }),
        GetMoonCalendar,
    )?;

    Ok(())
}

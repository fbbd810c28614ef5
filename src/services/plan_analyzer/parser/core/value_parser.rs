//! Value parsing utilities for binary plan runtime statistics
//!
//! Handles parsing of duration strings, counters and ratios as they appear in
//! execution info summaries, and formatting of reconciled durations.

use crate::services::plan_analyzer::parser::error::{ParseError, ParseResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;
use std::time::Duration;

static TIME_COMPONENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*(ms|us|μs|µs|ns|h|m|s)").unwrap());

static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(-?[\d,]+(?:\.\d+)?)").unwrap());

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;

/// Value parser for execution info statistics
pub struct ValueParser;

impl ValueParser {
    /// Parse duration string to Duration
    ///
    /// Supports formats like: "1h30m", "7s854ms", "123ms", "5.540µs", "390ns"
    ///
    /// # Examples
    /// ```ignore
    /// let d = ValueParser::parse_duration("1m2.5s").unwrap();
    /// assert_eq!(d.as_millis(), 62_500);
    /// ```
    pub fn parse_duration(input: &str) -> ParseResult<Duration> {
        let input = input.trim();

        if input == "0" {
            return Ok(Duration::ZERO);
        }

        let mut total_ns: f64 = 0.0;
        let mut found_any = false;

        for cap in TIME_COMPONENT_REGEX.captures_iter(input) {
            found_any = true;

            let num_str = &cap[1];
            let num: f64 = num_str.parse().map_err(|_| {
                ParseError::ParseDurationError(format!(
                    "Invalid number '{}' in duration '{}'",
                    num_str, input
                ))
            })?;

            let ns = match &cap[2] {
                "h" => num * 3600.0 * 1_000_000_000.0,
                "m" => num * 60.0 * 1_000_000_000.0,
                "s" => num * 1_000_000_000.0,
                "ms" => num * 1_000_000.0,
                "us" | "μs" | "µs" => num * 1_000.0,
                "ns" => num,
                _ => 0.0,
            };

            total_ns += ns;
        }

        if !found_any {
            return Err(ParseError::ParseDurationError(format!(
                "No valid time components found in '{}'",
                input
            )));
        }

        if total_ns < 0.0 {
            return Err(ParseError::ParseDurationError(format!(
                "Negative duration '{}'",
                input
            )));
        }

        Ok(Duration::from_nanos(total_ns.round() as u64))
    }

    /// Parse number from string, handling thousands separators and trailing units
    ///
    /// Supports: "1,234,567", "334", "15 rows"
    pub fn parse_number<T>(input: &str) -> ParseResult<T>
    where
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        let input = input.trim();

        if let Some(cap) = NUMBER_REGEX.captures(input) {
            let num_str = cap[1].replace(',', "");
            return num_str.parse::<T>().map_err(|e| {
                ParseError::ParseNumberError(format!("Failed to parse number '{}': {}", num_str, e))
            });
        }

        Err(ParseError::ParseNumberError(format!("Cannot extract number from '{}'", input)))
    }

    /// Parse a ratio to a fraction in [0, 1]
    ///
    /// "80.000%" and "0.8" both yield 0.8.
    pub fn parse_ratio(input: &str) -> ParseResult<f64> {
        let input = input.trim();
        let (number, scale) = match input.strip_suffix('%') {
            Some(stripped) => (stripped.trim(), 100.0),
            None => (input, 1.0),
        };

        let value: f64 = number.parse().map_err(|_| {
            ParseError::ParsePercentageError(format!("Cannot parse ratio from '{}'", input))
        })?;

        Ok((value / scale).clamp(0.0, 1.0))
    }

    /// Format a duration the way the plan producer prints it
    ///
    /// `0s`, `390ns`, `5.54µs`, `12.3ms`, `7.854s`, `1m2.5s`, `1h0m0s`
    pub fn format_duration(duration: Duration) -> String {
        let total_ns = duration.as_nanos();

        if total_ns == 0 {
            return "0s".to_string();
        }
        if total_ns < NANOS_PER_MICRO {
            return format!("{}ns", total_ns);
        }
        if total_ns < NANOS_PER_MILLI {
            return format!("{}µs", format_fraction(total_ns, NANOS_PER_MICRO));
        }
        if total_ns < NANOS_PER_SECOND {
            return format!("{}ms", format_fraction(total_ns, NANOS_PER_MILLI));
        }

        let total_minutes = total_ns / NANOS_PER_MINUTE;
        let hours = total_minutes / 60;
        let minutes = total_minutes % 60;
        let seconds_ns = total_ns % NANOS_PER_MINUTE;

        let mut out = String::new();
        if hours > 0 {
            let _ = write!(out, "{}h", hours);
        }
        if hours > 0 || minutes > 0 {
            let _ = write!(out, "{}m", minutes);
        }
        let _ = write!(out, "{}s", format_fraction(seconds_ns, NANOS_PER_SECOND));
        out
    }
}

/// Render `value / unit` with the fractional part trimmed of trailing zeros
fn format_fraction(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }

    let width = unit.to_string().len() - 1;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

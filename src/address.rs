//! Feed address parsing.
//!
//! The configuration string is an endpoint (URL, host:port pair or local
//! file path) with an optional inline update-period directive:
//!
//! ```text
//! https://example.com/profiles.feed[update=PT30S]
//! ```
//!
//! The directive value is an ISO-8601 duration (`P2DT3H4M5.5S`, any
//! component optional, case-insensitive) or a bare decimal number of
//! seconds.

use crate::error::{FeedError, Result};
use std::str::FromStr;
use std::time::Duration;

/// Update period used when the address carries no `[update=...]` directive.
pub const DEFAULT_UPDATE_PERIOD: Duration = Duration::from_secs(60);

/// Parsed feed address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedAddress {
    /// Endpoint, directive stripped.
    pub endpoint: String,

    /// Minimum interval between poll attempts. Mutable after parsing via
    /// [`Connection::set_update_period`](crate::Connection::set_update_period).
    pub update_period: Duration,
}

impl FeedAddress {
    /// Address with the default update period.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            update_period: DEFAULT_UPDATE_PERIOD,
        }
    }

    /// Override the update period (builder style).
    pub fn with_update_period(mut self, period: Duration) -> Self {
        self.update_period = period;
        self
    }

    /// Parse a configuration string per the grammar above.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FeedError::InvalidAddress("empty address".to_string()));
        }

        const DIRECTIVE: &str = "[update=";
        let Some(start) = input.rfind(DIRECTIVE) else {
            if input.contains('[') || input.contains(']') {
                return Err(FeedError::InvalidAddress(format!(
                    "malformed directive in address: {}",
                    input
                )));
            }
            return Ok(Self::new(input));
        };

        let Some(value) = input[start + DIRECTIVE.len()..].strip_suffix(']') else {
            return Err(FeedError::InvalidAddress(format!(
                "unterminated [update=...] directive: {}",
                input
            )));
        };

        let endpoint = input[..start].trim();
        if endpoint.is_empty() {
            return Err(FeedError::InvalidAddress("empty endpoint".to_string()));
        }

        let period = parse_duration(value)?;
        if period.is_zero() {
            return Err(FeedError::InvalidAddress(format!(
                "update period must be positive: {}",
                value
            )));
        }

        Ok(Self::new(endpoint).with_update_period(period))
    }
}

impl FromStr for FeedAddress {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse an ISO-8601 duration (days/hours/minutes/seconds subset) or a
/// bare decimal number of seconds.
fn parse_duration(input: &str) -> Result<Duration> {
    let bad = || FeedError::InvalidAddress(format!("invalid duration: {}", input));
    let value = input.trim();
    if value.is_empty() {
        return Err(bad());
    }

    // Bare number of seconds.
    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(bad());
        }
        return Ok(Duration::from_secs_f64(seconds));
    }

    let upper = value.to_ascii_uppercase();
    let mut rest = upper.strip_prefix('P').ok_or_else(bad)?;

    let mut total = 0.0f64;
    let mut in_time = false;
    let mut seen_component = false;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('T') {
            if in_time {
                return Err(bad());
            }
            in_time = true;
            rest = after;
            continue;
        }

        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(bad)?;
        if digits_end == 0 {
            return Err(bad());
        }
        let number: f64 = rest[..digits_end].parse().map_err(|_| bad())?;
        let unit = rest.as_bytes()[digits_end];
        rest = &rest[digits_end + 1..];

        let scale = match (unit, in_time) {
            (b'D', false) => 86_400.0,
            (b'H', true) => 3_600.0,
            (b'M', true) => 60.0,
            (b'S', true) => 1.0,
            _ => return Err(bad()),
        };
        total += number * scale;
        seen_component = true;
    }

    if !seen_component {
        return Err(bad());
    }
    Ok(Duration::from_secs_f64(total))
}

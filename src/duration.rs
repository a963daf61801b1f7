// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for Go-style duration strings.
//!
//! Supports parsing sampling intervals in Go format (e.g., "30s", "2m", "1h")
//! into `std::time::Duration`. The forwarder's interval is clamped to a sane
//! range so a typo in the addon spec cannot stall or flood the pipeline.

use anyhow::{bail, Context, Result};
use std::time::Duration;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;

/// Minimum accepted sampling interval (10 seconds).
pub const MIN_INTERVAL_SECS: u64 = 10;

/// Maximum accepted sampling interval (1 hour).
pub const MAX_INTERVAL_SECS: u64 = 3600;

/// Parse a Go-style duration string into a Rust `Duration`.
///
/// Supported units:
/// - `s` (seconds): "30s"
/// - `m` (minutes): "5m"
/// - `h` (hours): "1h"
///
/// # Examples
///
/// ```
/// use forwardy::duration::parse_interval;
/// use std::time::Duration;
///
/// assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_interval("5m").unwrap(), Duration::from_secs(300));
///
/// // Invalid formats return errors
/// assert!(parse_interval("").is_err());
/// assert!(parse_interval("30").is_err());  // Missing unit
/// assert!(parse_interval("30x").is_err()); // Invalid unit
/// ```
///
/// # Errors
///
/// Returns an error if:
/// - The format is invalid (missing unit, non-numeric value)
/// - The interval is below the minimum (10s)
/// - The interval is above the maximum (1h)
pub fn parse_interval(interval_str: &str) -> Result<Duration> {
    if interval_str.is_empty() {
        bail!("Interval string cannot be empty");
    }

    let split_pos = interval_str
        .chars()
        .position(|c| !c.is_ascii_digit())
        .context("Interval must end with a unit (s, m, or h)")?;

    let (value_str, unit) = interval_str.split_at(split_pos);

    let value: u64 = value_str
        .parse()
        .context("Interval value must be a positive integer")?;

    let seconds = match unit {
        "s" => value,
        "m" => value
            .checked_mul(SECONDS_PER_MINUTE)
            .context("Interval value too large (overflow)")?,
        "h" => value
            .checked_mul(SECONDS_PER_HOUR)
            .context("Interval value too large (overflow)")?,
        _ => {
            bail!("Unsupported interval unit '{unit}'. Use 's' (seconds), 'm' (minutes), or 'h' (hours)")
        }
    };

    if seconds < MIN_INTERVAL_SECS {
        bail!("Interval '{interval_str}' is below minimum of {MIN_INTERVAL_SECS}s");
    }

    if seconds > MAX_INTERVAL_SECS {
        bail!("Interval '{interval_str}' exceeds maximum of {MAX_INTERVAL_SECS}s (1 hour)");
    }

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;

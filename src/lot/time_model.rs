//! Countdown parsing and remaining-time arithmetic.
//!
//! The site renders the countdown as unit-suffixed tokens such as
//! `"1j 5h 30m 12s"`. Days may appear as `j` or `d`; anything between tokens
//! is ignored.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_MINUTE: i64 = 60;

/// Longest countdown accepted as real. Anything above is a scrape error.
pub const MAX_COUNTDOWN_SECONDS: i64 = 10 * 366 * SECONDS_PER_DAY;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s?([jdhms])").expect("valid countdown pattern"));

const UNITS: [(i64, char); 4] = [
    (SECONDS_PER_DAY, 'd'),
    (SECONDS_PER_HOUR, 'h'),
    (SECONDS_PER_MINUTE, 'm'),
    (1, 's'),
];

fn unit_seconds(unit: &str) -> i64 {
    match unit {
        "j" | "d" => SECONDS_PER_DAY,
        "h" => SECONDS_PER_HOUR,
        "m" => SECONDS_PER_MINUTE,
        _ => 1,
    }
}

/// Total seconds in a countdown string.
///
/// `None` if it holds no unit token, or if the total overflows or exceeds
/// [`MAX_COUNTDOWN_SECONDS`].
pub fn try_parse_duration(text: &str) -> Option<i64> {
    let mut total: Option<i64> = None;

    for caps in TOKEN.captures_iter(text) {
        let seconds = caps[1]
            .parse::<i64>()
            .ok()
            .and_then(|value| value.checked_mul(unit_seconds(&caps[2])))?;
        total = Some(total.unwrap_or(0).checked_add(seconds)?);
    }

    total.filter(|seconds| *seconds <= MAX_COUNTDOWN_SECONDS)
}

/// Total seconds in a countdown string. Empty or unparseable input yields 0.
pub fn parse_duration(text: &str) -> i64 {
    try_parse_duration(text).unwrap_or(0)
}

/// Render whole seconds greedily as `"1d 5h 30m 12s"`, skipping zero units.
///
/// Zero and negative inputs render as `"0s"`.
pub fn format_duration(seconds: i64) -> String {
    let mut rest = seconds.max(0);
    let mut parts = Vec::with_capacity(UNITS.len());

    for (size, code) in UNITS {
        let quantity = rest / size;
        if quantity > 0 {
            parts.push(format!("{quantity}{code}"));
            rest %= size;
        }
    }

    if parts.is_empty() {
        return "0s".to_string();
    }
    parts.join(" ")
}

/// Countdown left at `now` for a snapshot captured at `captured_at`.
///
/// Negative when the listing has already closed; never clamped. `None` when
/// the countdown does not parse.
pub fn remaining_time(captured_at: DateTime<Utc>, duration: &str, now: DateTime<Utc>) -> Option<Duration> {
    let total = Duration::try_seconds(try_parse_duration(duration)?)?;
    total.checked_sub(&(now - captured_at))
}

//! Resync interval parsing

use std::time::Duration;

use crate::Error;

/// Interval used when a record does not set `syncInterval`
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Parse a record's `syncInterval` (`"30s"`, `"5m"`, `"1h30m"`, `"1.5h"`).
///
/// Anything humantime accepts is valid, as are Go-style fractional
/// components such as `"1.5h"` or `"1.5m30s"`. Unset or blank values yield
/// [`DEFAULT_SYNC_INTERVAL`]. A zero interval is rejected since it would
/// requeue the record in a tight loop.
pub fn parse_sync_interval(value: Option<&str>) -> Result<Duration, Error> {
    let raw = match value.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_SYNC_INTERVAL),
        Some(raw) => raw,
    };

    let interval = match humantime::parse_duration(raw) {
        Ok(interval) => interval,
        Err(e) => parse_fractional(raw).ok_or_else(|| Error::InvalidInterval {
            value: raw.to_string(),
            message: e.to_string(),
        })?,
    };

    if interval.is_zero() {
        return Err(Error::InvalidInterval {
            value: raw.to_string(),
            message: "interval must be greater than zero".to_string(),
        });
    }

    Ok(interval)
}

/// `<decimal><unit>` components, units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`
fn parse_fractional(raw: &str) -> Option<Duration> {
    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = raw;
    let mut seconds = 0f64;

    if rest.is_empty() {
        return None;
    }
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let value: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest.find(is_number).unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        seconds += value * scale;
        rest = &rest[unit_end..];
    }

    Duration::try_from_secs_f64(seconds).ok()
}

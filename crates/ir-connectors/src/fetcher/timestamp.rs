//! Second-precision UTC timestamps as exchanged with the log API and the checkpoint store.

use crate::traits::{ConnectorError, ConnectorResult};
use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};

/// `YYYY-MM-DDTHH:MM:SSZ`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse(value: &str) -> ConnectorResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| ConnectorError::InvalidRequest(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Drops sub-second precision so the value survives a format/parse cycle unchanged.
pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(0)
}

/// Resolves a relative first-fetch expression such as `"3 days"`, `"12h"` or
/// `"2weeks"` against `now`.
///
/// Durations use [`humantime`] units, matched case-insensitively. An absolute
/// timestamp in [`TIMESTAMP_FORMAT`] is also accepted.
pub fn parse_relative(expr: &str, now: DateTime<Utc>) -> ConnectorResult<DateTime<Utc>> {
    let expr = expr.trim();
    if let Ok(ts) = parse(expr) {
        return Ok(ts);
    }

    let invalid = |reason: String| {
        ConnectorError::InvalidRequest(format!(
            "Invalid first fetch time '{}': {} (expected e.g. '3 days')",
            expr, reason
        ))
    };

    let elapsed = humantime::parse_duration(&expr.to_lowercase())
        .map_err(|e| invalid(e.to_string()))?;
    let delta = Duration::from_std(elapsed).map_err(|e| invalid(e.to_string()))?;
    let start = now
        .checked_sub_signed(delta)
        .ok_or_else(|| invalid("reaches before the earliest representable time".to_string()))?;

    Ok(truncate(start))
}

/// Serde adapter storing timestamps in [`TIMESTAMP_FORMAT`].
pub mod serde_format {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

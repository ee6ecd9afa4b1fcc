// Send-time parsing
//
// Submission timestamps are ISO 8601. A value with an explicit offset is
// taken as-is; a naive value is resolved in the reference timezone. The
// result is always an absolute instant.

use crate::errors::ValidationError;
use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a submission timestamp into an absolute instant
pub fn parse_send_time(raw: &str, timezone: Tz) -> Result<DateTime<FixedOffset>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingField("expected_sent_at".to_string()));
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant);
    }

    let naive = parse_naive(raw).ok_or_else(|| ValidationError::InvalidTimestamp(raw.to_string()))?;
    resolve_local(naive, timezone)
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Resolve a naive local time in `timezone`
///
/// Times that fall into a DST gap or overlap are rejected rather than guessed.
pub fn resolve_local(
    naive: NaiveDateTime,
    timezone: Tz,
) -> Result<DateTime<FixedOffset>, ValidationError> {
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.fixed_offset()),
        LocalResult::Ambiguous(_, _) => Err(ValidationError::InvalidFieldValue {
            field: "expected_sent_at".to_string(),
            reason: format!("{} is ambiguous in {}; include a UTC offset", naive, timezone),
        }),
        LocalResult::None => Err(ValidationError::InvalidFieldValue {
            field: "expected_sent_at".to_string(),
            reason: format!("{} does not exist in {}", naive, timezone),
        }),
    }
}

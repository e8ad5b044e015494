use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de;

use crate::Time;

/// Parses either an RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` one
/// which is then assumed to be in UTC
pub fn parse_time(s: &str) -> Option<Time> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| Utc.from_utc_datetime(&t))
}

struct TimeVisitor;

impl<'de> de::Visitor<'de> for TimeVisitor {
    type Value = Time;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a timestamp string or a number of milliseconds since the epoch")
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Time, E> {
        parse_time(s).ok_or_else(|| E::custom(format!("invalid timestamp {s:?}")))
    }

    fn visit_i64<E: de::Error>(self, ms: i64) -> Result<Time, E> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| E::custom(format!("timestamp {ms} out of range")))
    }

    fn visit_u64<E: de::Error>(self, ms: u64) -> Result<Time, E> {
        let ms = i64::try_from(ms).map_err(|_| E::custom(format!("timestamp {ms} out of range")))?;
        self.visit_i64(ms)
    }
}

pub(crate) fn deserialize<'de, D>(d: D) -> Result<Time, D::Error>
where
    D: de::Deserializer<'de>,
{
    d.deserialize_any(TimeVisitor)
}

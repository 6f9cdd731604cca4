use crate::domain::errors::{SyncError, SyncResult};
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Timelike, Utc};
use derive_more::{Deref, Display, From, Into};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Value Object - sensor identifier (non-empty, trimmed, comma free)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SensorId(String);

impl SensorId {
    pub fn parse(raw: &str) -> SyncResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SyncError::Validation("Sensor name cannot be empty".to_string()));
        }
        // comma is the list separator in the `sensors` query parameter
        if trimmed.contains(',') {
            return Err(SyncError::Validation(format!(
                "Sensor name '{trimmed}' must not contain ','"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SensorId {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SensorId> for String {
    fn from(value: SensorId) -> Self {
        value.0
    }
}

/// Value Object - UTC instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Deref)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn value(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(millis).map(Self)
    }

    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Accepts RFC 3339; a value without an offset is read as UTC.
    pub fn parse(raw: &str) -> SyncResult<Self> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self(parsed.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self(naive.and_utc()))
            .map_err(|e| SyncError::Parse(format!("invalid timestamp '{raw}': {e}")))
    }

    /// Wire form for outgoing requests: `2024-01-01T10:00:00.000Z`.
    pub fn to_wire(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Drops seconds and below; range bounds live at minute precision.
    pub fn truncate_to_minute(&self) -> Self {
        let truncated = self
            .0
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(self.0);
        Self(truncated)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Value Object - closed time window, `start <= end`, minute precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRange {
    start: Timestamp,
    end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> SyncResult<Self> {
        let start = start.truncate_to_minute();
        let end = end.truncate_to_minute();
        if start > end {
            return Err(SyncError::Validation(format!(
                "Range start {} is after end {}",
                start.to_wire(),
                end.to_wire()
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` days leading up to `now`, clamped at the earliest representable instant.
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        let end = Timestamp::from(now).truncate_to_minute();
        let start = Duration::try_days(days.max(0))
            .and_then(|span| end.value().checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start: Timestamp::from(start).truncate_to_minute(), end }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sensor_id_is_trimmed_and_validated() {
        assert_eq!(SensorId::parse("  sensor-01 ").unwrap().value(), "sensor-01");
        assert!(SensorId::parse("   ").is_err());
        assert!(SensorId::parse("a,b").is_err());
    }

    #[test]
    fn timestamp_without_offset_is_utc() {
        let naive = Timestamp::parse("2024-03-01T12:30:00").unwrap();
        let zulu = Timestamp::parse("2024-03-01T12:30:00Z").unwrap();
        let offset = Timestamp::parse("2024-03-01T14:30:00+02:00").unwrap();
        assert_eq!(naive, zulu);
        assert_eq!(zulu, offset);
        assert_eq!(zulu.to_wire(), "2024-03-01T12:30:00.000Z");
    }

    #[test]
    fn range_rejects_inverted_bounds_and_truncates() {
        let a = Timestamp::from(Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 45).unwrap());
        let b = Timestamp::from(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert!(TimeRange::new(a, b).is_err());
        let range = TimeRange::new(b, a).unwrap();
        assert_eq!(range.end().to_wire(), "2024-01-02T10:00:00.000Z");
    }

    #[test]
    fn last_days_spans_requested_window() {
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 9, 15, 30).unwrap();
        let range = TimeRange::last_days(now, 7);
        assert_eq!(range.start().to_wire(), "2024-01-01T09:15:00.000Z");
        assert_eq!(range.end().to_wire(), "2024-01-08T09:15:00.000Z");
    }

    #[test]
    fn last_days_clamps_huge_spans() {
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 9, 15, 30).unwrap();
        for days in [200_000_000, i64::MAX] {
            let range = TimeRange::last_days(now, days);
            assert_eq!(range.start().value(), DateTime::<Utc>::MIN_UTC);
            assert!(range.contains(Timestamp::from(now).truncate_to_minute()));
        }
    }
}

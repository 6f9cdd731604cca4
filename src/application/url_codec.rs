use crate::domain::{
    errors::{SyncError, SyncResult},
    sensor_data::{SensorId, TimeRange, Timestamp},
    view_state::{SensorSelection, ViewState},
};
use chrono::{FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use std::borrow::Cow;

const LOCAL_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";
const LOCAL_INPUT_FORMAT_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

/// Zone the `start`/`end` parameters are written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    /// The host's zone, DST aware.
    System,
    Fixed(FixedOffset),
}

/// Decoded address-bar state. The range is `None` when absent or invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedUrl {
    pub selected: SensorSelection,
    pub range: Option<TimeRange>,
}

/// `sensors=a,b&start=YYYY-MM-DDTHH:MM&end=YYYY-MM-DDTHH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlCodec {
    zone: LocalZone,
}

impl Default for UrlCodec {
    fn default() -> Self {
        Self::new(LocalZone::System)
    }
}

impl UrlCodec {
    pub fn new(zone: LocalZone) -> Self {
        Self { zone }
    }

    /// `None` minutes means the host zone.
    pub fn from_offset_minutes(minutes: Option<i32>) -> SyncResult<Self> {
        match minutes {
            None => Ok(Self::new(LocalZone::System)),
            Some(minutes) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .map(|offset| Self::new(LocalZone::Fixed(offset)))
                .ok_or_else(|| SyncError::Validation(format!("Invalid UTC offset: {minutes} minutes"))),
        }
    }

    pub fn encode(&self, view: &ViewState) -> String {
        let mut params = Vec::with_capacity(3);
        if !view.selected.is_empty() {
            let ids: Vec<Cow<'_, str>> =
                view.selected.iter().map(|id| urlencoding::encode(id.value())).collect();
            params.push(format!("sensors={}", ids.join(",")));
        }
        params.push(format!("start={}", self.format_local_input(view.range.start())));
        params.push(format!("end={}", self.format_local_input(view.range.end())));
        params.join("&")
    }

    pub fn decode(&self, query: &str) -> DecodedUrl {
        let mut selected = SensorSelection::new();
        let mut start = None;
        let mut end = None;

        for (key, value) in parse_pairs(query) {
            match key.as_str() {
                "sensors" => {
                    // empty pieces ("a,,b") are skipped, like invalid ids
                    selected = SensorSelection::from_ids(
                        value.split(',').filter_map(|raw| SensorId::parse(raw).ok()),
                    );
                }
                "start" => start = self.parse_local_input(&value).ok(),
                "end" => end = self.parse_local_input(&value).ok(),
                _ => {}
            }
        }

        let range = match (start, end) {
            (Some(start), Some(end)) => TimeRange::new(start, end).ok(),
            _ => None,
        };
        DecodedUrl { selected, range }
    }

    /// `2024-01-01T10:00` in the configured zone.
    pub fn format_local_input(&self, timestamp: Timestamp) -> String {
        match self.zone {
            LocalZone::System => timestamp.value().with_timezone(&Local).format(LOCAL_INPUT_FORMAT).to_string(),
            LocalZone::Fixed(offset) => {
                timestamp.value().with_timezone(&offset).format(LOCAL_INPUT_FORMAT).to_string()
            }
        }
    }

    /// Interprets a local-input string in the configured zone and converts it to UTC.
    pub fn parse_local_input(&self, raw: &str) -> SyncResult<Timestamp> {
        let naive = NaiveDateTime::parse_from_str(raw, LOCAL_INPUT_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, LOCAL_INPUT_FORMAT_SECONDS))
            .map_err(|e| SyncError::Validation(format!("Invalid date '{raw}': {e}")))?;

        let resolved = match self.zone {
            // earliest: a repeated wall-clock hour resolves to its first occurrence
            LocalZone::System => Local.from_local_datetime(&naive).earliest().map(|t| t.with_timezone(&Utc)),
            LocalZone::Fixed(offset) => offset.from_local_datetime(&naive).single().map(|t| t.with_timezone(&Utc)),
        };
        resolved
            .map(Timestamp::from)
            .ok_or_else(|| SyncError::Validation(format!("Date '{raw}' does not exist in the local zone")))
    }
}

/// Query string → decoded `(key, value)` pairs. `+` reads as a space.
fn parse_pairs(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Canonical form used to compare queries written by us with observed ones.
pub fn normalize_query(query: &str) -> &str {
    query.trim_start_matches('?')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_plus_two() -> UrlCodec {
        UrlCodec::from_offset_minutes(Some(120)).unwrap()
    }

    #[test]
    fn local_input_is_converted_to_utc() {
        let codec = utc_plus_two();
        let ts = codec.parse_local_input("2024-06-01T12:00").unwrap();
        assert_eq!(ts.to_wire(), "2024-06-01T10:00:00.000Z");
        assert_eq!(codec.format_local_input(ts), "2024-06-01T12:00");
    }

    #[test]
    fn decode_skips_empty_ids_and_bad_dates() {
        let decoded = utc_plus_two().decode("?sensors=a,,b&start=garbage&end=2024-06-01T12:00");
        let names: Vec<&str> = decoded.selected.iter().map(|s| s.value()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(decoded.range, None);
    }

    #[test]
    fn decode_accepts_percent_encoded_separator() {
        let decoded = utc_plus_two().decode("sensors=a%2Cb&start=2024-06-01T10%3A00&end=2024-06-01T12:00");
        assert_eq!(decoded.selected.len(), 2);
        assert!(decoded.range.is_some());
    }

    #[test]
    fn inverted_range_is_dropped() {
        let decoded = utc_plus_two().decode("start=2024-06-02T00:00&end=2024-06-01T00:00");
        assert_eq!(decoded.range, None);
    }
}

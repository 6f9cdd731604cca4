pub use super::value_objects::{SensorId, TimeRange, Timestamp};
use crate::domain::errors::SyncResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric name → nullable value (temperature, humidity, pressure, rssi, ...)
pub type Metrics = BTreeMap<String, Option<f64>>;

/// Domain entity - one sensor observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "sensor")]
    source_id: SensorId,
    timestamp: Timestamp,
    #[serde(flatten)]
    fields: Metrics,
}

impl Reading {
    pub fn new(source_id: SensorId, timestamp: Timestamp, fields: Metrics) -> Self {
        Self { source_id, timestamp, fields }
    }

    /// Decode one stream frame or history item.
    pub fn from_json(raw: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn source_id(&self) -> &SensorId {
        &self.source_id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn fields(&self) -> &Metrics {
        &self.fields
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied().flatten()
    }

    /// Identity used for deduplication.
    pub fn key(&self) -> (SensorId, Timestamp) {
        (self.source_id.clone(), self.timestamp)
    }
}

/// Aggregates the backend keeps per sensor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorStatistics {
    pub total_readings: u64,
    pub first_reading: Option<Timestamp>,
    pub last_reading: Option<Timestamp>,
    pub last_24h_readings: u64,
    pub average_temperature: Option<f64>,
    pub average_humidity: Option<f64>,
    pub average_pressure: Option<f64>,
    pub average_rssi: Option<f64>,
}

/// Domain entity - sensor metadata as served by `GET /api/sensors/{name}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub name: SensorId,
    pub created: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    #[serde(default)]
    pub statistics: SensorStatistics,
}

impl SensorInfo {
    pub fn new(name: SensorId) -> Self {
        Self { name, created: None, modified: None, statistics: SensorStatistics::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_maps_sensor_and_metrics() {
        let reading = Reading::from_json(
            r#"{"sensor":"sensor-01","timestamp":"2024-05-01T08:00:00Z","temperature":21.5,"humidity":40,"altitude":null}"#,
        )
        .unwrap();
        assert_eq!(reading.source_id().value(), "sensor-01");
        assert_eq!(reading.metric("temperature"), Some(21.5));
        assert_eq!(reading.metric("humidity"), Some(40.0));
        assert_eq!(reading.metric("altitude"), None);
        assert!(reading.fields().contains_key("altitude"));
    }

    #[test]
    fn frame_without_sensor_is_rejected() {
        assert!(Reading::from_json(r#"{"timestamp":"2024-05-01T08:00:00Z"}"#).is_err());
        assert!(Reading::from_json(r#"{"sensor":"","timestamp":"2024-05-01T08:00:00Z"}"#).is_err());
        assert!(Reading::from_json("not json").is_err());
    }

    #[test]
    fn sensor_info_tolerates_missing_statistics() {
        let info: SensorInfo = serde_json::from_str(
            r#"{"name":"sensor-01","created":"2024-01-01T00:00:00","modified":null}"#,
        )
        .unwrap();
        assert_eq!(info.name.value(), "sensor-01");
        assert_eq!(info.statistics.total_readings, 0);
    }
}

use crate::application::url_codec::UrlCodec;
use crate::domain::{
    connection::{ReconnectPolicy, StreamEndpoints},
    errors::{SyncError, SyncResult},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Roughly a century.
const MAX_RANGE_DAYS: u32 = 36_500;

/// Runtime settings, usually handed over from JS as a plain object.
/// Every field is optional there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Prefix of the REST API, without trailing slash (`""` = same origin).
    pub api_base_url: String,
    pub stream: StreamEndpoints,
    pub reconnect: ReconnectPolicy,
    pub url_guard_delay_ms: u64,
    pub default_range_days: u32,
    pub live_mode: bool,
    /// Fixed offset for `start`/`end` in the address; `None` uses the browser zone.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            stream: StreamEndpoints::default(),
            reconnect: ReconnectPolicy::default(),
            url_guard_delay_ms: 200,
            default_range_days: 7,
            live_mode: true,
            utc_offset_minutes: None,
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> SyncResult<()> {
        self.reconnect.validate()?;
        if !(1..=MAX_RANGE_DAYS).contains(&self.default_range_days) {
            return Err(SyncError::Validation(format!(
                "default_range_days must be between 1 and {MAX_RANGE_DAYS}"
            )));
        }
        if self.stream.host.trim().is_empty() {
            return Err(SyncError::Validation("Stream host must not be empty".to_string()));
        }
        if !self.stream.sensor_path.contains("{sensor}") {
            return Err(SyncError::Validation(format!(
                "Sensor stream path '{}' lacks a {{sensor}} placeholder",
                self.stream.sensor_path
            )));
        }
        self.url_codec().map(|_| ())
    }

    pub fn url_guard_delay(&self) -> Duration {
        Duration::from_millis(self.url_guard_delay_ms)
    }

    pub fn url_codec(&self) -> SyncResult<UrlCodec> {
        UrlCodec::from_offset_minutes(self.utc_offset_minutes)
    }

    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::BackoffStrategy;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{"api_base_url": "https://meteo.example/", "reconnect": {"max_attempts": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.api_base(), "https://meteo.example");
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.strategy, BackoffStrategy::Fixed { interval_ms: 3_000 });
        assert_eq!(config.url_guard_delay(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn exponential_strategy_is_tagged() {
        let config: DashboardConfig = serde_json::from_str(
            r#"{"reconnect": {"strategy": {"kind": "exponential", "initial_ms": 500, "max_ms": 8000}}}"#,
        )
        .unwrap();
        assert_eq!(
            config.reconnect.strategy,
            BackoffStrategy::Exponential { initial_ms: 500, max_ms: 8_000 }
        );
    }

    #[test]
    fn rejects_bad_settings() {
        let mut config = DashboardConfig { default_range_days: 0, ..Default::default() };
        assert!(config.validate().is_err());

        config = DashboardConfig { utc_offset_minutes: Some(24 * 60), ..Default::default() };
        assert!(config.validate().is_err());

        config = DashboardConfig { default_range_days: 200_000_000, ..Default::default() };
        assert!(matches!(config.validate(), Err(SyncError::Validation(_))));

        config = DashboardConfig::default();
        config.stream.sensor_path = "/ws/weather".to_string();
        assert!(matches!(config.validate(), Err(SyncError::Validation(_))));
    }

    #[test]
    fn extreme_offsets_are_rejected_not_wrapped() {
        for minutes in [i32::MAX, i32::MIN, 24 * 60] {
            let config = DashboardConfig { utc_offset_minutes: Some(minutes), ..Default::default() };
            assert!(matches!(config.validate(), Err(SyncError::Validation(_))));
        }
        let config = DashboardConfig { utc_offset_minutes: Some(-(23 * 60 + 59)), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn longest_default_range_is_usable() {
        let config = DashboardConfig { default_range_days: MAX_RANGE_DAYS, ..Default::default() };
        assert!(config.validate().is_ok());
        let now = chrono::Utc::now();
        let range = crate::domain::sensor_data::TimeRange::last_days(now, i64::from(config.default_range_days));
        assert!(range.start() < range.end());
    }
}

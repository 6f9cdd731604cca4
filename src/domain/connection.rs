use crate::domain::errors::{SyncError, SyncResult};
use crate::domain::sensor_data::SensorId;
use crate::domain::view_state::ViewState;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{AsRefStr, Display as StrumDisplay};

/// Close code of an intentional shutdown; never followed by a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code the backend uses when the requested sensor does not exist.
pub const POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, AsRefStr, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

/// Published connection status: state plus consecutive failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub attempt: u32,
}

impl ConnectionStatus {
    pub fn new(state: ConnectionState, attempt: u32) -> Self {
        Self { state, attempt }
    }

    pub fn disconnected() -> Self {
        Self::new(ConnectionState::Disconnected, 0)
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed { interval_ms: u64 },
    /// `initial_ms`, doubled per consecutive failure, capped at `max_ms`.
    Exponential { initial_ms: u64, max_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub strategy: BackoffStrategy,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { strategy: BackoffStrategy::Fixed { interval_ms: 3_000 }, max_attempts: 10 }
    }
}

impl ReconnectPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed { interval_ms: interval.as_millis() as u64 },
            max_attempts,
        }
    }

    pub fn exponential(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            strategy: BackoffStrategy::Exponential {
                initial_ms: initial.as_millis() as u64,
                max_ms: max.as_millis() as u64,
            },
            max_attempts,
        }
    }

    /// Delay before the reconnect that follows failure number `failures` (1-based),
    /// measured from the close event.
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed { interval_ms } => Duration::from_millis(interval_ms),
            BackoffStrategy::Exponential { initial_ms, max_ms } => {
                let exponent = failures.saturating_sub(1).min(32);
                let delay = initial_ms.saturating_mul(1u64 << exponent);
                Duration::from_millis(delay.min(max_ms))
            }
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        match self.strategy {
            BackoffStrategy::Fixed { interval_ms: 0 } => {
                Err(SyncError::Validation("Reconnect interval must be positive".to_string()))
            }
            BackoffStrategy::Exponential { initial_ms, max_ms } if initial_ms == 0 || max_ms < initial_ms => {
                Err(SyncError::Validation(
                    "Exponential backoff needs 0 < initial_ms <= max_ms".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Live-connection endpoint derived from the selection.
///
/// Targets compare by endpoint: every fan-in target is the same connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamTarget {
    Single(SensorId),
    FanIn,
}

impl StreamTarget {
    /// `None` when live mode is off or nothing is selected.
    pub fn derive(view: &ViewState, live: bool) -> Option<StreamTarget> {
        if !live {
            return None;
        }
        match view.selected.ids() {
            [] => None,
            [only] => Some(StreamTarget::Single(only.clone())),
            _ => Some(StreamTarget::FanIn),
        }
    }
}

/// Where stream endpoints live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamEndpoints {
    pub secure: bool,
    pub host: String,
    /// `{sensor}` is replaced by the url-encoded sensor id.
    pub sensor_path: String,
    pub fan_in_path: String,
}

impl Default for StreamEndpoints {
    fn default() -> Self {
        Self {
            secure: false,
            host: "localhost".to_string(),
            sensor_path: "/ws/sensors/{sensor}/weather".to_string(),
            fan_in_path: "/ws/weather".to_string(),
        }
    }
}

impl StreamEndpoints {
    pub fn url_for(&self, target: &StreamTarget) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = match target {
            StreamTarget::Single(sensor) => {
                self.sensor_path.replace("{sensor}", &urlencoding::encode(sensor.value()))
            }
            StreamTarget::FanIn => self.fan_in_path.clone(),
        };
        format!("{scheme}://{}{path}", self.host)
    }
}

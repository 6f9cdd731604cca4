//! Seams between the synchronization core and the host environment.
//!
//! Every port is fire-and-forget: completions come back later as
//! [`DashboardEvent`](crate::domain::events::DashboardEvent)s. Implementations must
//! never call back into the controller synchronously.

use crate::domain::errors::SyncResult;
use crate::domain::events::{ConnectionId, HistoryRequest, SensorRequest, TimerToken};
use chrono::{DateTime, Utc};
use std::time::Duration;
use strum::{AsRefStr, Display as StrumDisplay};

/// Bidirectional socket factory
pub trait SocketTransport {
    /// Starts opening a socket. `Err` means it could not even be created
    /// (e.g. malformed URL) and counts as a failed attempt.
    fn connect(&mut self, connection: ConnectionId, url: &str) -> SyncResult<()>;
    fn send(&mut self, connection: ConnectionId, payload: &str) -> SyncResult<()>;
    /// Intentional shutdown; no further events are expected for `connection`.
    fn close(&mut self, connection: ConnectionId, code: u16, reason: &str);
    /// The socket closed by itself; drop whatever is held for it.
    fn release(&mut self, connection: ConnectionId);
}

pub trait TimerScheduler {
    fn schedule(&mut self, token: TimerToken, delay: Duration);
    fn cancel(&mut self, token: TimerToken);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, AsRefStr)]
pub enum HistoryMode {
    /// New history entry (user actions, so back/forward can walk them).
    Push,
    /// Overwrite the current entry (startup normalization).
    Replace,
}

/// Addressable URL of the page
pub trait UrlHost {
    /// Query string without the leading `?`.
    fn read_query(&self) -> String;
    /// Updates the address without reloading the page.
    fn write_query(&mut self, query: &str, mode: HistoryMode);
    fn href(&self) -> String;
}

/// Wall clock; only consulted for "last N days" defaults.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// HTTP API for sensor metadata and historical ranges
pub trait SensorApi {
    fn fetch_sensor(&mut self, request: SensorRequest);
    fn fetch_history(&mut self, request: HistoryRequest);
}

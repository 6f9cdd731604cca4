use crate::domain::errors::SyncError;
use crate::domain::sensor_data::{Reading, SensorId, SensorInfo, TimeRange};
use std::fmt::Debug;

/// Base trait for everything the runtime dispatches
pub trait DomainEvent: Debug {
    fn event_type(&self) -> &'static str;
}

/// Identifies one physical socket; events from older sockets are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Reconnect,
    UrlGuard,
}

/// Handle of one scheduled timer. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub kind: TimerKind,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketEventKind {
    Opened,
    Message(String),
    Error(String),
    Closed { code: u16, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocketEvent {
    pub connection: ConnectionId,
    pub kind: SocketEventKind,
}

impl SocketEvent {
    pub fn new(connection: ConnectionId, kind: SocketEventKind) -> Self {
        Self { connection, kind }
    }
}

/// Why sensor metadata was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorIntent {
    /// User asked to add the sensor; select it only if it exists.
    Add,
    /// Sensor is already selected; refresh its metadata.
    Refresh,
}

/// Tags a history request with the view it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub range: TimeRange,
}

/// Requests issued by the controller, answered through [`DashboardEvent`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRequest {
    pub sensor: SensorId,
    pub intent: SensorIntent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub sensor: SensorId,
    pub ticket: FetchTicket,
}

/// Actions coming from the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Start,
    AddSensor(String),
    RemoveSensor(String),
    SetRange(TimeRange),
    /// Range as typed into local-time inputs (`YYYY-MM-DDTHH:MM`).
    SetLocalRange { start: String, end: String },
    SetLiveMode(bool),
    ResetToDefaults,
    DismissError,
    Shutdown,
}

/// Every input of the controller. All of them are handled synchronously, one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    Command(UserCommand),
    Socket(SocketEvent),
    TimerElapsed(TimerToken),
    /// Address bar changed (back/forward or any other external navigation).
    UrlChanged(String),
    SensorLoaded { request: SensorRequest, result: Result<SensorInfo, SyncError> },
    HistoryLoaded { request: HistoryRequest, result: Result<Vec<Reading>, SyncError> },
}

impl DomainEvent for DashboardEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DashboardEvent::Command(_) => "Command",
            DashboardEvent::Socket(_) => "Socket",
            DashboardEvent::TimerElapsed(_) => "TimerElapsed",
            DashboardEvent::UrlChanged(_) => "UrlChanged",
            DashboardEvent::SensorLoaded { .. } => "SensorLoaded",
            DashboardEvent::HistoryLoaded { .. } => "HistoryLoaded",
        }
    }
}

/// Output of the stream client, consumed by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Reading(Reading),
    StateChanged(crate::domain::connection::ConnectionStatus),
    Error(SyncError),
}

impl DomainEvent for StreamEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Reading(_) => "Reading",
            StreamEvent::StateChanged(_) => "StateChanged",
            StreamEvent::Error(_) => "Error",
        }
    }
}

/// Route back into the runtime for asynchronous completions
pub trait EventDispatcher {
    fn dispatch(&self, event: DashboardEvent);
}

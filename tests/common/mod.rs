#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sensor_dashboard_sync::application::{
    Clock, DashboardConfig, DashboardController, DashboardPorts, HistoryMode, SensorApi, SocketTransport,
    TimerScheduler, UrlHost,
};
use sensor_dashboard_sync::domain::{
    connection::ReconnectPolicy,
    errors::{SyncError, SyncResult},
    events::{ConnectionId, HistoryRequest, SensorRequest, SocketEvent, SocketEventKind, TimerToken},
    sensor_data::{Reading, SensorId, Timestamp},
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum SocketCall {
    Connect(ConnectionId, String),
    Send(ConnectionId, String),
    Close(ConnectionId, u16),
    Release(ConnectionId),
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    pub calls: Rc<RefCell<Vec<SocketCall>>>,
    pub refuse: Rc<Cell<bool>>,
}

impl FakeTransport {
    pub fn connects(&self) -> Vec<(ConnectionId, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                SocketCall::Connect(id, url) => Some((*id, url.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn last_connection(&self) -> ConnectionId {
        self.connects().last().map(|(id, _)| *id).expect("no connection opened")
    }

    pub fn closes(&self) -> Vec<(ConnectionId, u16)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                SocketCall::Close(id, code) => Some((*id, *code)),
                _ => None,
            })
            .collect()
    }
}

impl SocketTransport for FakeTransport {
    fn connect(&mut self, connection: ConnectionId, url: &str) -> SyncResult<()> {
        self.calls.borrow_mut().push(SocketCall::Connect(connection, url.to_string()));
        if self.refuse.get() {
            return Err(SyncError::Connection("refused".to_string()));
        }
        Ok(())
    }

    fn send(&mut self, connection: ConnectionId, payload: &str) -> SyncResult<()> {
        self.calls.borrow_mut().push(SocketCall::Send(connection, payload.to_string()));
        Ok(())
    }

    fn close(&mut self, connection: ConnectionId, code: u16, _reason: &str) {
        self.calls.borrow_mut().push(SocketCall::Close(connection, code));
    }

    fn release(&mut self, connection: ConnectionId) {
        self.calls.borrow_mut().push(SocketCall::Release(connection));
    }
}

#[derive(Clone, Default)]
pub struct FakeTimers {
    pub scheduled: Rc<RefCell<Vec<(TimerToken, Duration)>>>,
    pub pending: Rc<RefCell<Vec<TimerToken>>>,
}

impl FakeTimers {
    pub fn last(&self) -> TimerToken {
        self.scheduled.borrow().last().map(|(token, _)| *token).expect("nothing scheduled")
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.pending.borrow().contains(&token)
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.borrow().len()
    }
}

impl TimerScheduler for FakeTimers {
    fn schedule(&mut self, token: TimerToken, delay: Duration) {
        self.scheduled.borrow_mut().push((token, delay));
        self.pending.borrow_mut().push(token);
    }

    fn cancel(&mut self, token: TimerToken) {
        self.pending.borrow_mut().retain(|pending| *pending != token);
    }
}

#[derive(Clone, Default)]
pub struct FakeUrl {
    pub query: Rc<RefCell<String>>,
    pub writes: Rc<RefCell<Vec<(String, HistoryMode)>>>,
}

impl FakeUrl {
    pub fn with_query(query: &str) -> Self {
        let url = Self::default();
        *url.query.borrow_mut() = query.to_string();
        url
    }

    pub fn query(&self) -> String {
        self.query.borrow().clone()
    }

    /// External navigation (back/forward or a pasted link).
    pub fn navigate(&self, query: &str) -> String {
        *self.query.borrow_mut() = query.to_string();
        query.to_string()
    }

    pub fn write_count(&self) -> usize {
        self.writes.borrow().len()
    }

    pub fn last_mode(&self) -> Option<HistoryMode> {
        self.writes.borrow().last().map(|(_, mode)| *mode)
    }
}

impl UrlHost for FakeUrl {
    fn read_query(&self) -> String {
        self.query()
    }

    fn write_query(&mut self, query: &str, mode: HistoryMode) {
        *self.query.borrow_mut() = query.to_string();
        self.writes.borrow_mut().push((query.to_string(), mode));
    }

    fn href(&self) -> String {
        format!("https://dash.example/?{}", self.query())
    }
}

#[derive(Clone, Default)]
pub struct FakeApi {
    pub sensors: Rc<RefCell<Vec<SensorRequest>>>,
    pub history: Rc<RefCell<Vec<HistoryRequest>>>,
}

impl FakeApi {
    pub fn last_sensor_request(&self) -> SensorRequest {
        self.sensors.borrow().last().cloned().expect("no sensor request")
    }

    pub fn history_for(&self, sensor: &str) -> Vec<HistoryRequest> {
        self.history.borrow().iter().filter(|request| request.sensor.value() == sensor).cloned().collect()
    }
}

impl SensorApi for FakeApi {
    fn fetch_sensor(&mut self, request: SensorRequest) {
        self.sensors.borrow_mut().push(request);
    }

    fn fetch_history(&mut self, request: HistoryRequest) {
        self.history.borrow_mut().push(request);
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 2024-06-08 12:00 UTC; the default range is 2024-06-01T12:00 → 2024-06-08T12:00.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap()
}

pub const DEFAULT_RANGE_QUERY: &str = "start=2024-06-01T12:00&end=2024-06-08T12:00";

pub fn id(raw: &str) -> SensorId {
    SensorId::parse(raw).unwrap()
}

pub fn at(raw: &str) -> Timestamp {
    Timestamp::parse(raw).unwrap()
}

pub fn reading(sensor: &str, timestamp: &str, temperature: f64) -> Reading {
    let mut fields = BTreeMap::new();
    fields.insert("temperature".to_string(), Some(temperature));
    Reading::new(id(sensor), at(timestamp), fields)
}

pub fn frame(sensor: &str, timestamp: &str, temperature: f64) -> String {
    serde_json::json!({
        "sensor": sensor,
        "timestamp": timestamp,
        "temperature": temperature,
        "humidity": 40.0,
        "rssi": null
    })
    .to_string()
}

pub fn socket(connection: ConnectionId, kind: SocketEventKind) -> SocketEvent {
    SocketEvent::new(connection, kind)
}

pub fn closed(code: u16) -> SocketEventKind {
    SocketEventKind::Closed { code, reason: String::new() }
}

pub fn test_config() -> DashboardConfig {
    DashboardConfig {
        utc_offset_minutes: Some(0),
        reconnect: ReconnectPolicy::fixed(Duration::from_secs(3), 3),
        ..Default::default()
    }
}

/// Controller wired to fakes; the handles share state with the boxed ports.
pub struct Harness {
    pub controller: DashboardController,
    pub transport: FakeTransport,
    pub stream_timers: FakeTimers,
    pub url: FakeUrl,
    pub url_timers: FakeTimers,
    pub api: FakeApi,
}

impl Harness {
    pub fn new(query: &str) -> Self {
        Self::with_config(test_config(), query)
    }

    pub fn with_config(config: DashboardConfig, query: &str) -> Self {
        let transport = FakeTransport::default();
        let stream_timers = FakeTimers::default();
        let url = FakeUrl::with_query(query);
        let url_timers = FakeTimers::default();
        let api = FakeApi::default();
        let ports = DashboardPorts {
            transport: Box::new(transport.clone()),
            stream_timers: Box::new(stream_timers.clone()),
            url_host: Box::new(url.clone()),
            url_timers: Box::new(url_timers.clone()),
            api: Box::new(api.clone()),
            clock: Box::new(FixedClock(now())),
        };
        let controller = DashboardController::new(config, ports).unwrap();
        Self { controller, transport, stream_timers, url, url_timers, api }
    }

    pub fn started(query: &str) -> Self {
        let mut harness = Self::new(query);
        harness.controller.start();
        harness
    }

    pub fn selected(&self) -> Vec<String> {
        self.controller.view().selected.iter().map(|sensor| sensor.value().to_string()).collect()
    }
}

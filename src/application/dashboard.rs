use crate::application::{
    config::DashboardConfig,
    ports::{Clock, SensorApi, SocketTransport, TimerScheduler, UrlHost},
    stream_client::{StreamClient, StreamHandlers},
    url_sync::{StateUrlSync, UrlReconciliation},
};
use crate::domain::{
    connection::{ConnectionStatus, StreamTarget},
    errors::{SyncError, SyncResult},
    events::{
        DashboardEvent, DomainEvent, FetchTicket, HistoryRequest, SensorIntent, SensorRequest,
        StreamEvent, TimerKind, UserCommand,
    },
    logging::LogComponent,
    sensor_data::{DataMerger, IngestOutcome, Reading, SensorId, SensorInfo, TimeRange},
    view_state::ViewState,
};
use crate::{log_debug, log_info, log_trace, log_warn};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

const COMPONENT: LogComponent = LogComponent::Application("Dashboard");

/// Host adapters the controller drives
pub struct DashboardPorts {
    pub transport: Box<dyn SocketTransport>,
    pub stream_timers: Box<dyn TimerScheduler>,
    pub url_host: Box<dyn UrlHost>,
    pub url_timers: Box<dyn TimerScheduler>,
    pub api: Box<dyn SensorApi>,
    pub clock: Box<dyn Clock>,
}

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub series: Vec<Reading>,
    pub connection: ConnectionStatus,
    pub error: Option<String>,
    pub view: ViewState,
    /// Metadata of selected sensors, in selection order.
    pub sensors: Vec<SensorInfo>,
    pub loading: bool,
    pub live: bool,
    pub revision: u64,
}

/// Single owner of the dashboard state. Every input arrives through
/// [`DashboardController::handle`] (or the equivalent direct methods) and is
/// processed to completion before the next one.
pub struct DashboardController {
    config: DashboardConfig,
    stream: StreamClient,
    stream_events: Rc<RefCell<VecDeque<StreamEvent>>>,
    url: StateUrlSync,
    api: Box<dyn SensorApi>,
    clock: Box<dyn Clock>,
    merger: DataMerger,
    sensors: Vec<SensorInfo>,
    pending_adds: HashSet<SensorId>,
    pending_refreshes: HashSet<SensorId>,
    pending_history: HashMap<SensorId, FetchTicket>,
    next_generation: u64,
    live: bool,
    connection: ConnectionStatus,
    error: Option<SyncError>,
    started: bool,
    revision: u64,
}

impl DashboardController {
    pub fn new(config: DashboardConfig, ports: DashboardPorts) -> SyncResult<Self> {
        config.validate()?;
        let codec = config.url_codec()?;
        let default_range = Self::default_range(&config, ports.clock.as_ref());

        let stream = StreamClient::new(
            ports.transport,
            ports.stream_timers,
            config.stream.clone(),
            config.reconnect,
        );
        let url = StateUrlSync::new(
            ports.url_host,
            ports.url_timers,
            codec,
            config.url_guard_delay(),
            default_range,
        );

        Ok(Self {
            live: config.live_mode,
            config,
            stream,
            stream_events: Rc::new(RefCell::new(VecDeque::new())),
            url,
            api: ports.api,
            clock: ports.clock,
            merger: DataMerger::new(),
            sensors: Vec::new(),
            pending_adds: HashSet::new(),
            pending_refreshes: HashSet::new(),
            pending_history: HashMap::new(),
            next_generation: 0,
            connection: ConnectionStatus::disconnected(),
            error: None,
            started: false,
            revision: 0,
        })
    }

    fn default_range(config: &DashboardConfig, clock: &dyn Clock) -> TimeRange {
        TimeRange::last_days(clock.now(), i64::from(config.default_range_days))
    }

    /// Adopts the address, loads metadata and history for the sensors it names
    /// and opens the stream. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let default_range = Self::default_range(&self.config, self.clock.as_ref());
        let initial = self.url.load_initial(default_range).clone();
        log_info!(COMPONENT, "Starting with {} sensor(s), live={}", initial.selected.len(), self.live);

        for sensor in initial.selected.iter() {
            self.request_sensor(sensor.clone(), SensorIntent::Refresh);
        }
        self.request_history(initial.selected.ids().to_vec());

        let sink = Rc::clone(&self.stream_events);
        let target = StreamTarget::derive(&initial, self.live);
        self.stream.open(target, StreamHandlers::new(move |event| sink.borrow_mut().push_back(event)));
        self.drain_stream_events();
        self.touch();
    }

    pub fn handle(&mut self, event: DashboardEvent) {
        log_trace!(COMPONENT, "Handling {}", event.event_type());
        match event {
            DashboardEvent::Command(command) => self.execute(command),
            DashboardEvent::Socket(event) => self.stream.on_socket_event(event),
            DashboardEvent::TimerElapsed(token) => match token.kind {
                TimerKind::Reconnect => self.stream.on_timer(token),
                TimerKind::UrlGuard => self.url.on_timer(token),
            },
            DashboardEvent::UrlChanged(query) => self.on_url_changed(&query),
            DashboardEvent::SensorLoaded { request, result } => self.on_sensor_loaded(request, result),
            DashboardEvent::HistoryLoaded { request, result } => self.on_history_loaded(request, result),
        }
        self.drain_stream_events();
    }

    pub fn execute(&mut self, command: UserCommand) {
        match command {
            UserCommand::Start => self.start(),
            UserCommand::AddSensor(name) => self.add_sensor(&name),
            UserCommand::RemoveSensor(name) => self.remove_sensor(&name),
            UserCommand::SetRange(range) => self.set_range(range),
            UserCommand::SetLocalRange { start, end } => self.set_local_range(&start, &end),
            UserCommand::SetLiveMode(live) => self.set_live_mode(live),
            UserCommand::ResetToDefaults => {
                let now = self.clock.now();
                self.reset_to_defaults(now);
            }
            UserCommand::DismissError => self.dismiss_error(),
            UserCommand::Shutdown => self.shutdown(),
        }
    }

    /// Validates `name` against the backend and selects it once it is known to exist.
    pub fn add_sensor(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let sensor = match SensorId::parse(name) {
            Ok(sensor) => sensor,
            Err(error) => return self.fail(error),
        };
        if self.url.view().selected.contains(&sensor) {
            return self.fail(SyncError::Validation(format!("Sensor '{sensor}' is already selected")));
        }
        if !self.pending_adds.insert(sensor.clone()) {
            log_debug!(COMPONENT, "Sensor {sensor} is already being added");
            return;
        }

        log_info!(COMPONENT, "Adding sensor {sensor}");
        self.error = None;
        self.api.fetch_sensor(SensorRequest { sensor, intent: SensorIntent::Add });
        self.touch();
    }

    /// Each id is validated and fetched on its own; one failure does not block the rest.
    pub fn add_sensors<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.add_sensor(name);
        }
    }

    pub fn remove_sensor(&mut self, name: &str) {
        let Ok(sensor) = SensorId::parse(name) else {
            return;
        };
        let previous = self.url.view().clone();
        if self.url.deselect(&sensor) {
            log_info!(COMPONENT, "Removed sensor {sensor}");
            self.apply_view_change(&previous);
        }
    }

    pub fn set_range(&mut self, range: TimeRange) {
        let previous = self.url.view().clone();
        if self.url.set_range(range) {
            log_info!(COMPONENT, "Range set to {} → {}", range.start().to_wire(), range.end().to_wire());
            self.apply_view_change(&previous);
        }
    }

    /// Same as [`Self::set_range`] for values typed into local-time inputs.
    pub fn set_local_range(&mut self, start: &str, end: &str) {
        match self.parse_local_range(start, end) {
            Ok(range) => self.set_range(range),
            Err(error) => self.fail(error),
        }
    }

    pub fn parse_local_range(&self, start: &str, end: &str) -> SyncResult<TimeRange> {
        let codec = self.url.codec();
        TimeRange::new(codec.parse_local_input(start)?, codec.parse_local_input(end)?)
    }

    pub fn set_live_mode(&mut self, live: bool) {
        if self.live == live {
            return;
        }
        log_info!(COMPONENT, "Live mode {}", if live { "on" } else { "off" });
        self.live = live;
        self.retarget();
        self.touch();
    }

    /// Empty selection, default range ending at `now`, empty series, no error.
    pub fn reset_to_defaults(&mut self, now: DateTime<Utc>) {
        log_info!(COMPONENT, "Resetting to defaults");
        let range = TimeRange::last_days(now, i64::from(self.config.default_range_days));
        self.url.reset(range);
        self.merger.clear();
        self.sensors.clear();
        self.pending_adds.clear();
        self.pending_refreshes.clear();
        self.pending_history.clear();
        self.error = None;
        self.retarget();
        self.touch();
    }

    pub fn dismiss_error(&mut self) {
        if self.error.take().is_some() {
            self.touch();
        }
    }

    /// Forwards a payload over the live stream.
    pub fn send(&mut self, payload: &str) -> SyncResult<()> {
        let result = self.stream.send(payload);
        self.drain_stream_events();
        result
    }

    pub fn shutdown(&mut self) {
        log_info!(COMPONENT, "Shutting down");
        self.stream.close();
        self.drain_stream_events();
        self.started = false;
        self.touch();
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            series: self.merger.readings().to_vec(),
            connection: self.connection,
            error: self.error.as_ref().map(ToString::to_string),
            view: self.url.view().clone(),
            sensors: self.selected_sensors(),
            loading: self.is_loading(),
            live: self.live,
            revision: self.revision,
        }
    }

    /// Bumped on every change visible in [`Self::snapshot`].
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn series(&self) -> &[Reading] {
        self.merger.readings()
    }

    pub fn view(&self) -> &ViewState {
        self.url.view()
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Any history fetch or metadata lookup still outstanding.
    pub fn is_loading(&self) -> bool {
        !self.pending_history.is_empty() || !self.pending_adds.is_empty() || !self.pending_refreshes.is_empty()
    }

    pub fn stream_target(&self) -> Option<&StreamTarget> {
        self.stream.target()
    }

    pub fn shareable_url(&self) -> String {
        self.url.shareable_url()
    }

    fn on_url_changed(&mut self, query: &str) {
        match self.url.on_url_changed(query) {
            UrlReconciliation::SelfWrite | UrlReconciliation::Unchanged => {}
            UrlReconciliation::External { previous } => self.apply_view_change(&previous),
        }
    }

    /// Brings data, metadata, pending requests and the stream in line with the
    /// view after it changed from `previous`.
    fn apply_view_change(&mut self, previous: &ViewState) {
        let current = self.url.view().clone();

        let removed = previous.selected.added_since(&current.selected);
        if !removed.is_empty() {
            for sensor in &removed {
                self.pending_history.remove(sensor);
                self.pending_refreshes.remove(sensor);
            }
            self.sensors.retain(|info| current.selected.contains(&info.name));
            let pruned = self.merger.retain_sources(&current.selected);
            if pruned > 0 {
                log_info!(COMPONENT, "Pruned {pruned} reading(s) of deselected sensors");
            }
        }

        let added = current.selected.added_since(&previous.selected);
        for sensor in &added {
            if !self.sensors.iter().any(|info| &info.name == sensor) {
                self.request_sensor(sensor.clone(), SensorIntent::Refresh);
            }
        }

        if current.range != previous.range {
            let pruned = self.merger.retain_range(&current.range);
            if pruned > 0 {
                log_info!(COMPONENT, "Pruned {pruned} reading(s) outside the new range");
            }
            self.request_history(current.selected.ids().to_vec());
        } else {
            self.request_history(added);
        }

        self.retarget();
        self.touch();
    }

    fn on_sensor_loaded(&mut self, request: SensorRequest, result: SyncResult<SensorInfo>) {
        let SensorRequest { sensor, intent } = request;
        match intent {
            SensorIntent::Add => {
                if !self.pending_adds.remove(&sensor) {
                    log_debug!(COMPONENT, "Discarding stale lookup of {sensor}");
                    return;
                }
                self.touch();
                match result {
                    Ok(info) => {
                        let previous = self.url.view().clone();
                        self.store_info(info);
                        if self.url.select(sensor) {
                            self.error = None;
                            self.apply_view_change(&previous);
                        }
                    }
                    Err(error) => self.fail(error),
                }
            }
            SensorIntent::Refresh => {
                if !self.pending_refreshes.remove(&sensor) || !self.url.view().selected.contains(&sensor) {
                    log_debug!(COMPONENT, "Discarding stale metadata for {sensor}");
                    return;
                }
                match result {
                    Ok(info) => self.store_info(info),
                    // the id stays selected; the error names it
                    Err(error) => self.fail(error),
                }
                self.touch();
            }
        }
    }

    fn on_history_loaded(&mut self, request: HistoryRequest, result: SyncResult<Vec<Reading>>) {
        if self.pending_history.get(&request.sensor) != Some(&request.ticket) {
            log_debug!(
                COMPONENT,
                "Discarding stale history for {} (generation {})",
                request.sensor,
                request.ticket.generation
            );
            return;
        }
        self.pending_history.remove(&request.sensor);
        self.touch();

        match result {
            Ok(readings) => {
                let selection = &self.url.view().selected;
                let readings: Vec<Reading> =
                    readings.into_iter().filter(|reading| selection.contains(reading.source_id())).collect();
                let received = readings.len();
                let added = self.merger.ingest_batch(readings);
                log_info!(COMPONENT, "History for {}: {added} new of {received}", request.sensor);
            }
            Err(error) => self.fail(error),
        }
    }

    fn request_sensor(&mut self, sensor: SensorId, intent: SensorIntent) {
        if intent == SensorIntent::Refresh {
            self.pending_refreshes.insert(sensor.clone());
        }
        self.api.fetch_sensor(SensorRequest { sensor, intent });
    }

    /// One request per sensor, each tagged with a fresh generation and the current range.
    fn request_history(&mut self, sensors: Vec<SensorId>) {
        let range = self.url.view().range;
        for sensor in sensors {
            self.next_generation += 1;
            let ticket = FetchTicket { generation: self.next_generation, range };
            self.pending_history.insert(sensor.clone(), ticket);
            self.api.fetch_history(HistoryRequest { sensor, ticket });
        }
    }

    fn store_info(&mut self, info: SensorInfo) {
        match self.sensors.iter_mut().find(|existing| existing.name == info.name) {
            Some(existing) => *existing = info,
            None => self.sensors.push(info),
        }
    }

    fn selected_sensors(&self) -> Vec<SensorInfo> {
        self.url
            .view()
            .selected
            .iter()
            .filter_map(|sensor| self.sensors.iter().find(|info| &info.name == sensor))
            .cloned()
            .collect()
    }

    fn retarget(&mut self) {
        if !self.started {
            return;
        }
        let target = StreamTarget::derive(self.url.view(), self.live);
        self.stream.retarget(target);
        self.drain_stream_events();
    }

    /// Applies everything the stream client produced during the last call into it.
    fn drain_stream_events(&mut self) {
        loop {
            let Some(event) = self.stream_events.borrow_mut().pop_front() else {
                break;
            };
            match event {
                StreamEvent::Reading(reading) => {
                    if self.merger.ingest_stream(reading, &self.url.view().selected) == IngestOutcome::Inserted {
                        self.touch();
                    }
                }
                StreamEvent::StateChanged(status) => {
                    log_debug!(COMPONENT, "Connection {} (attempt {})", status.state, status.attempt);
                    self.connection = status;
                    if status.is_connected() && self.error.as_ref().is_some_and(SyncError::is_connection) {
                        self.error = None;
                    }
                    self.touch();
                }
                StreamEvent::Error(error) => self.fail(error),
            }
        }
    }

    fn fail(&mut self, error: SyncError) {
        log_warn!(COMPONENT, "{error}");
        self.error = Some(error);
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

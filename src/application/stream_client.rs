use crate::application::ports::{SocketTransport, TimerScheduler};
use crate::domain::{
    connection::{
        ConnectionState, ConnectionStatus, NORMAL_CLOSURE, POLICY_VIOLATION, ReconnectPolicy,
        StreamEndpoints, StreamTarget,
    },
    errors::{SyncError, SyncResult},
    events::{ConnectionId, SocketEvent, SocketEventKind, StreamEvent, TimerKind, TimerToken},
    logging::LogComponent,
    sensor_data::Reading,
};
use crate::{log_debug, log_info, log_warn};

const COMPONENT: LogComponent = LogComponent::Application("StreamClient");

/// Receiver for everything the client produces: parsed readings, state
/// transitions and errors.
pub struct StreamHandlers {
    sink: Box<dyn FnMut(StreamEvent)>,
}

impl StreamHandlers {
    pub fn new(sink: impl FnMut(StreamEvent) + 'static) -> Self {
        Self { sink: Box::new(sink) }
    }

    pub fn noop() -> Self {
        Self::new(|_| {})
    }
}

/// Internal state machine; [`ConnectionState`] is a projection of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting { connection: ConnectionId },
    Connected { connection: ConnectionId },
    Backoff { timer: TimerToken },
    Failed,
}

impl Phase {
    fn state(&self) -> ConnectionState {
        match self {
            Phase::Idle => ConnectionState::Disconnected,
            Phase::Connecting { .. } => ConnectionState::Connecting,
            Phase::Connected { .. } => ConnectionState::Connected,
            Phase::Backoff { .. } => ConnectionState::Reconnecting,
            Phase::Failed => ConnectionState::Failed,
        }
    }

    fn connection(&self) -> Option<ConnectionId> {
        match self {
            Phase::Connecting { connection } | Phase::Connected { connection } => Some(*connection),
            _ => None,
        }
    }
}

/// Persistent stream connection with bounded, sequential reconnection.
///
/// At most one socket is live at a time. Every socket gets a fresh
/// [`ConnectionId`] and every reconnect timer a fresh [`TimerToken`], so late
/// events from a superseded socket or a cancelled timer are no-ops.
pub struct StreamClient {
    transport: Box<dyn SocketTransport>,
    scheduler: Box<dyn TimerScheduler>,
    endpoints: StreamEndpoints,
    policy: ReconnectPolicy,
    handlers: StreamHandlers,
    target: Option<StreamTarget>,
    phase: Phase,
    failures: u32,
    next_connection: u64,
    next_timer: u64,
    last_published: Option<ConnectionStatus>,
}

impl StreamClient {
    pub fn new(
        transport: Box<dyn SocketTransport>,
        scheduler: Box<dyn TimerScheduler>,
        endpoints: StreamEndpoints,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            scheduler,
            endpoints,
            policy,
            handlers: StreamHandlers::noop(),
            target: None,
            phase: Phase::Idle,
            failures: 0,
            next_connection: 0,
            next_timer: 0,
            last_published: None,
        }
    }

    /// Installs `handlers` and moves to `target`.
    pub fn open(&mut self, target: Option<StreamTarget>, handlers: StreamHandlers) {
        self.handlers = handlers;
        self.retarget(target);
    }

    /// Moves to `target`, tearing the current socket down first when it differs.
    /// `None` means no connection is wanted.
    pub fn retarget(&mut self, target: Option<StreamTarget>) {
        let busy = matches!(
            self.phase,
            Phase::Connecting { .. } | Phase::Connected { .. } | Phase::Backoff { .. }
        );
        if busy && target == self.target {
            log_debug!(COMPONENT, "Target unchanged, keeping current connection");
            return;
        }

        self.teardown("Target changed");
        self.target = target;
        self.failures = 0;
        if self.target.is_some() {
            self.connect();
        } else {
            log_debug!(COMPONENT, "No stream target, staying disconnected");
            self.publish();
        }
    }

    /// Clean shutdown; nothing reconnects until the next `open`/`retarget`.
    pub fn close(&mut self) {
        self.teardown("Client closing");
        self.target = None;
        self.failures = 0;
        self.publish();
    }

    pub fn send(&mut self, payload: &str) -> SyncResult<()> {
        match self.phase {
            Phase::Connected { connection } => self.transport.send(connection, payload),
            _ => {
                log_warn!(COMPONENT, "Cannot send message, not connected");
                Err(SyncError::NotConnected)
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::new(self.phase.state(), self.failures)
    }

    pub fn target(&self) -> Option<&StreamTarget> {
        self.target.as_ref()
    }

    pub fn on_socket_event(&mut self, event: SocketEvent) {
        let Some(active) = self.phase.connection() else {
            log_debug!(COMPONENT, "Ignoring socket event for {:?}: no live socket", event.connection);
            return;
        };
        if event.connection != active {
            log_debug!(COMPONENT, "Ignoring event from superseded socket {:?}", event.connection);
            return;
        }

        match event.kind {
            SocketEventKind::Opened => {
                log_info!(COMPONENT, "Connected");
                self.phase = Phase::Connected { connection: active };
                self.failures = 0;
                self.publish();
            }
            SocketEventKind::Message(frame) => self.handle_frame(&frame),
            SocketEventKind::Error(detail) => {
                // An error may precede a close; the close drives the state.
                log_warn!(COMPONENT, "Socket error: {detail}");
                self.emit(StreamEvent::Error(SyncError::Connection(
                    "WebSocket connection error".to_string(),
                )));
            }
            SocketEventKind::Closed { code, reason } => {
                log_info!(COMPONENT, "Closed with code {code} ({reason})");
                self.transport.release(active);
                self.handle_close(code);
            }
        }
    }

    pub fn on_timer(&mut self, token: TimerToken) {
        match self.phase {
            Phase::Backoff { timer } if timer == token => {
                log_info!(COMPONENT, "Reconnecting (attempt {}/{})", self.failures, self.policy.max_attempts);
                self.connect();
            }
            _ => {
                log_debug!(COMPONENT, "Ignoring stale reconnect timer {}", token.id);
            }
        }
    }

    fn connect(&mut self) {
        let Some(target) = &self.target else {
            return;
        };
        let url = self.endpoints.url_for(target);
        self.next_connection += 1;
        let connection = ConnectionId(self.next_connection);
        self.phase = Phase::Connecting { connection };
        log_info!(COMPONENT, "Connecting to {url}");
        self.publish();

        if let Err(error) = self.transport.connect(connection, &url) {
            log_warn!(COMPONENT, "Failed to create connection: {error}");
            self.handle_failure();
        }
    }

    fn handle_frame(&mut self, frame: &str) {
        match Reading::from_json(frame) {
            Ok(reading) => self.emit(StreamEvent::Reading(reading)),
            Err(error) => {
                log_warn!(COMPONENT, "Dropping frame: {error}");
            }
        }
    }

    fn handle_close(&mut self, code: u16) {
        match code {
            NORMAL_CLOSURE => {
                self.phase = Phase::Idle;
                self.failures = 0;
                self.publish();
            }
            POLICY_VIOLATION => {
                self.phase = Phase::Failed;
                self.publish();
                let error = match &self.target {
                    Some(StreamTarget::Single(sensor)) => SyncError::NotFound(sensor.to_string()),
                    _ => SyncError::Connection("Stream rejected by server".to_string()),
                };
                self.emit(StreamEvent::Error(error));
            }
            _ => self.handle_failure(),
        }
    }

    /// One more consecutive failure: back off, or give up at the bound.
    fn handle_failure(&mut self) {
        self.failures += 1;
        if self.failures >= self.policy.max_attempts {
            log_warn!(COMPONENT, "Giving up after {} attempts", self.failures);
            self.phase = Phase::Failed;
            self.publish();
            self.emit(StreamEvent::Error(SyncError::Connection(
                "Max reconnection attempts reached".to_string(),
            )));
            return;
        }

        let delay = self.policy.delay_for(self.failures);
        self.next_timer += 1;
        let timer = TimerToken { kind: TimerKind::Reconnect, id: self.next_timer };
        self.scheduler.schedule(timer, delay);
        self.phase = Phase::Backoff { timer };
        log_info!(
            COMPONENT,
            "Reconnecting in {}ms (attempt {}/{})",
            delay.as_millis(),
            self.failures,
            self.policy.max_attempts
        );
        self.publish();
    }

    fn teardown(&mut self, reason: &str) {
        match self.phase {
            Phase::Connecting { connection } | Phase::Connected { connection } => {
                log_info!(COMPONENT, "Closing connection: {reason}");
                self.transport.close(connection, NORMAL_CLOSURE, reason);
            }
            Phase::Backoff { timer } => self.scheduler.cancel(timer),
            Phase::Idle | Phase::Failed => {}
        }
        self.phase = Phase::Idle;
    }

    fn publish(&mut self) {
        let status = self.status();
        if self.last_published != Some(status) {
            self.last_published = Some(status);
            self.emit(StreamEvent::StateChanged(status));
        }
    }

    fn emit(&mut self, event: StreamEvent) {
        (self.handlers.sink)(event);
    }
}

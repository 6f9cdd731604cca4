use crate::application::ports::{HistoryMode, TimerScheduler, UrlHost};
use crate::application::url_codec::{UrlCodec, normalize_query};
use crate::domain::{
    events::{TimerKind, TimerToken},
    logging::LogComponent,
    sensor_data::{SensorId, TimeRange},
    view_state::ViewState,
};
use crate::{log_debug, log_info};
use std::time::Duration;

const COMPONENT: LogComponent = LogComponent::Application("UrlSync");

/// Self-write guard. While `Writing`, address notifications are ours (or
/// indistinguishable from ours) and are not reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteGuard {
    Idle,
    Writing { epoch: u64, expected: String, timer: TimerToken },
}

/// Outcome of an address-bar notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlReconciliation {
    /// Produced by our own write, or arrived inside the guard window.
    SelfWrite,
    /// The address already describes the current view.
    Unchanged,
    /// External navigation; the view now matches the address.
    External { previous: ViewState },
}

/// Keeps [`ViewState`] and the address bar in step without feeding back into itself.
///
/// The guard is released either when a notification echoes exactly the query we
/// wrote, or when the settle timer of the latest write fires. Hosts that never
/// echo (the History API does not fire `popstate` for `pushState`) rely on the
/// timer alone; an external navigation landing inside that window is ignored.
pub struct StateUrlSync {
    host: Box<dyn UrlHost>,
    scheduler: Box<dyn TimerScheduler>,
    codec: UrlCodec,
    settle_delay: Duration,
    view: ViewState,
    guard: WriteGuard,
    next_epoch: u64,
}

impl StateUrlSync {
    pub fn new(
        host: Box<dyn UrlHost>,
        scheduler: Box<dyn TimerScheduler>,
        codec: UrlCodec,
        settle_delay: Duration,
        default_range: TimeRange,
    ) -> Self {
        Self {
            host,
            scheduler,
            codec,
            settle_delay,
            view: ViewState::empty(default_range),
            guard: WriteGuard::Idle,
            next_epoch: 0,
        }
    }

    /// Adopts the address at startup; a missing or invalid range falls back to
    /// `default_range`. The normalized form replaces the current history entry.
    pub fn load_initial(&mut self, default_range: TimeRange) -> &ViewState {
        let decoded = self.codec.decode(&self.host.read_query());
        self.view = ViewState::new(decoded.selected, decoded.range.unwrap_or(default_range));
        log_info!(
            COMPONENT,
            "Initial view: {} sensor(s), {} → {}",
            self.view.selected.len(),
            self.view.range.start().to_wire(),
            self.view.range.end().to_wire()
        );
        self.write(HistoryMode::Replace);
        &self.view
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn codec(&self) -> &UrlCodec {
        &self.codec
    }

    pub fn is_guarded(&self) -> bool {
        self.pending_epoch().is_some()
    }

    /// Epoch of the write still awaiting confirmation or settle.
    pub fn pending_epoch(&self) -> Option<u64> {
        match self.guard {
            WriteGuard::Writing { epoch, .. } => Some(epoch),
            WriteGuard::Idle => None,
        }
    }

    pub fn select(&mut self, sensor: SensorId) -> bool {
        self.update(|view| {
            view.selected.insert(sensor);
        })
    }

    pub fn deselect(&mut self, sensor: &SensorId) -> bool {
        self.update(|view| {
            view.selected.remove(sensor);
        })
    }

    pub fn set_range(&mut self, range: TimeRange) -> bool {
        self.update(|view| view.range = range)
    }

    pub fn reset(&mut self, range: TimeRange) -> bool {
        self.update(|view| *view = ViewState::empty(range))
    }

    /// Applies a user mutation and mirrors it into the address.
    /// Returns `false` when the view is unchanged by value.
    pub fn update(&mut self, mutate: impl FnOnce(&mut ViewState)) -> bool {
        let mut next = self.view.clone();
        mutate(&mut next);
        if next == self.view {
            return false;
        }
        self.view = next;
        self.write(HistoryMode::Push);
        true
    }

    pub fn on_url_changed(&mut self, query: &str) -> UrlReconciliation {
        let observed = normalize_query(query);
        if let WriteGuard::Writing { expected, timer, .. } = &self.guard {
            if observed == expected.as_str() {
                log_debug!(COMPONENT, "Address write confirmed");
                let timer = *timer;
                self.scheduler.cancel(timer);
                self.guard = WriteGuard::Idle;
            } else {
                log_debug!(COMPONENT, "Ignoring address change during self-write: {observed}");
            }
            return UrlReconciliation::SelfWrite;
        }

        let decoded = self.codec.decode(observed);
        let candidate = ViewState::new(decoded.selected, decoded.range.unwrap_or(self.view.range));
        if candidate == self.view {
            return UrlReconciliation::Unchanged;
        }

        log_info!(COMPONENT, "External navigation to ?{observed}");
        let previous = std::mem::replace(&mut self.view, candidate);
        UrlReconciliation::External { previous }
    }

    pub fn on_timer(&mut self, token: TimerToken) {
        match &self.guard {
            WriteGuard::Writing { timer, .. } if *timer == token => {
                log_debug!(COMPONENT, "Write {} settled", token.id);
                self.guard = WriteGuard::Idle;
            }
            _ => {
                log_debug!(COMPONENT, "Ignoring stale guard timer {}", token.id);
            }
        }
    }

    pub fn shareable_url(&self) -> String {
        self.host.href()
    }

    fn write(&mut self, mode: HistoryMode) {
        let query = self.codec.encode(&self.view);
        if normalize_query(&self.host.read_query()) == query {
            return;
        }

        if let WriteGuard::Writing { timer, .. } = &self.guard {
            let timer = *timer;
            self.scheduler.cancel(timer);
        }
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let timer = TimerToken { kind: TimerKind::UrlGuard, id: epoch };

        log_debug!(COMPONENT, "{mode} ?{query}");
        self.host.write_query(&query, mode);
        self.scheduler.schedule(timer, self.settle_delay);
        self.guard = WriteGuard::Writing { epoch, expected: query, timer };
    }
}

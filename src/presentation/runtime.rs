use crate::application::dashboard::{DashboardController, DashboardSnapshot};
use crate::domain::{
    errors::{SyncError, SyncResult},
    events::{DashboardEvent, DomainEvent, EventDispatcher},
    logging::LogComponent,
};
use crate::log_trace;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

const COMPONENT: LogComponent = LogComponent::Presentation("Runtime");

/// Single-threaded event loop around the controller.
///
/// Events dispatched while another one is being handled are queued and run
/// afterwards, in order. After each event the snapshot is published if its
/// revision moved.
pub struct DashboardRuntime {
    controller: RefCell<Option<DashboardController>>,
    queue: RefCell<VecDeque<DashboardEvent>>,
    draining: Cell<bool>,
    published: Cell<Option<u64>>,
    publisher: Box<dyn Fn(&DashboardSnapshot)>,
}

impl DashboardRuntime {
    pub fn new(publisher: impl Fn(&DashboardSnapshot) + 'static) -> Rc<Self> {
        Rc::new(Self {
            controller: RefCell::new(None),
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
            published: Cell::new(None),
            publisher: Box::new(publisher),
        })
    }

    /// Handle given to adapters. It does not keep the runtime alive.
    pub fn dispatcher(self: &Rc<Self>) -> Rc<dyn EventDispatcher> {
        Rc::new(RuntimeDispatcher(Rc::downgrade(self)))
    }

    /// Events dispatched before this are kept and handled right after.
    pub fn install(&self, controller: DashboardController) {
        *self.controller.borrow_mut() = Some(controller);
        self.drain();
    }

    pub fn remove(&self) -> Option<DashboardController> {
        self.queue.borrow_mut().clear();
        self.published.set(None);
        self.controller.borrow_mut().take()
    }

    pub fn dispatch(&self, event: DashboardEvent) {
        log_trace!(COMPONENT, "Queued {}", event.event_type());
        self.queue.borrow_mut().push_back(event);
        self.drain();
    }

    pub fn snapshot(&self) -> Option<DashboardSnapshot> {
        self.with_controller(DashboardController::snapshot)
    }

    pub fn with_controller<R>(&self, f: impl FnOnce(&DashboardController) -> R) -> Option<R> {
        self.controller.try_borrow().ok()?.as_ref().map(f)
    }

    /// Direct call for operations that return a value. Fails while an event is
    /// being handled.
    pub fn with_controller_mut<R>(&self, f: impl FnOnce(&mut DashboardController) -> R) -> SyncResult<R> {
        let result = {
            let mut guard = self
                .controller
                .try_borrow_mut()
                .map_err(|_| SyncError::Host("dashboard is busy".to_string()))?;
            let controller = guard
                .as_mut()
                .ok_or_else(|| SyncError::Host("dashboard is not started".to_string()))?;
            f(controller)
        };
        self.publish_if_changed();
        self.drain();
        Ok(result)
    }

    fn drain(&self) {
        if self.draining.replace(true) {
            return;
        }
        loop {
            let Some(event) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            let Ok(mut guard) = self.controller.try_borrow_mut() else {
                self.queue.borrow_mut().push_front(event);
                break;
            };
            if guard.is_none() {
                drop(guard);
                self.queue.borrow_mut().push_front(event);
                break;
            }
            if let Some(controller) = guard.as_mut() {
                controller.handle(event);
            }
            drop(guard);
            self.publish_if_changed();
        }
        self.draining.set(false);
    }

    fn publish_if_changed(&self) {
        let published = self.published.get();
        let changed = self.with_controller(|controller| {
            let revision = controller.revision();
            (published != Some(revision)).then(|| (revision, controller.snapshot()))
        });
        if let Some(Some((revision, snapshot))) = changed {
            self.published.set(Some(revision));
            (self.publisher)(&snapshot);
        }
    }
}

struct RuntimeDispatcher(Weak<DashboardRuntime>);

impl EventDispatcher for RuntimeDispatcher {
    fn dispatch(&self, event: DashboardEvent) {
        match self.0.upgrade() {
            Some(runtime) => runtime.dispatch(event),
            None => {
                log_trace!(COMPONENT, "Runtime gone, dropping {}", event.event_type());
            }
        }
    }
}

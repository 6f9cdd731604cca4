use crate::application::ports::TimerScheduler;
use crate::domain::events::{DashboardEvent, EventDispatcher, TimerToken};
use futures::future::{AbortHandle, Abortable};
use gloo_timers::future::sleep;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen_futures::spawn_local;

/// `setTimeout`-backed scheduler. A token fires at most once, and only while
/// it is still pending.
#[derive(Clone)]
pub struct BrowserTimerScheduler {
    dispatcher: Rc<dyn EventDispatcher>,
    pending: Rc<RefCell<HashMap<TimerToken, AbortHandle>>>,
}

impl BrowserTimerScheduler {
    pub fn new(dispatcher: Rc<dyn EventDispatcher>) -> Self {
        Self { dispatcher, pending: Rc::new(RefCell::new(HashMap::new())) }
    }
}

impl TimerScheduler for BrowserTimerScheduler {
    fn schedule(&mut self, token: TimerToken, delay: Duration) {
        let (handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = self.pending.borrow_mut().insert(token, handle) {
            previous.abort();
        }

        let pending = Rc::clone(&self.pending);
        let dispatcher = Rc::clone(&self.dispatcher);
        let fire = async move {
            sleep(delay).await;
            let still_pending = pending.borrow_mut().remove(&token).is_some();
            if still_pending {
                dispatcher.dispatch(DashboardEvent::TimerElapsed(token));
            }
        };
        spawn_local(async move {
            let _ = Abortable::new(fire, registration).await;
        });
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(handle) = self.pending.borrow_mut().remove(&token) {
            handle.abort();
        }
    }
}

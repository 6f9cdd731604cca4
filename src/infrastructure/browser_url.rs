use crate::application::ports::{HistoryMode, UrlHost};
use crate::domain::{
    errors::{SyncError, SyncResult},
    events::{DashboardEvent, EventDispatcher},
    logging::LogComponent,
};
use crate::log_warn;
use gloo::events::EventListener;
use std::rc::Rc;
use wasm_bindgen::JsValue;
use web_sys::Window;

const COMPONENT: LogComponent = LogComponent::Infrastructure("BrowserUrl");

fn window() -> SyncResult<Window> {
    web_sys::window().ok_or_else(|| SyncError::Host("window".to_string()))
}

/// Address bar through `location` and the History API
pub struct BrowserUrlHost {
    window: Window,
}

impl BrowserUrlHost {
    pub fn new() -> SyncResult<Self> {
        Ok(Self { window: window()? })
    }
}

impl UrlHost for BrowserUrlHost {
    fn read_query(&self) -> String {
        current_query(&self.window)
    }

    fn write_query(&mut self, query: &str, mode: HistoryMode) {
        let location = self.window.location();
        let url = if query.is_empty() {
            location.pathname().unwrap_or_else(|_| "/".to_string())
        } else {
            format!("?{query}")
        };

        let written = self.window.history().and_then(|history| match mode {
            HistoryMode::Push => history.push_state_with_url(&JsValue::NULL, "", Some(&url)),
            HistoryMode::Replace => history.replace_state_with_url(&JsValue::NULL, "", Some(&url)),
        });
        if let Err(e) = written {
            log_warn!(COMPONENT, "{mode} of '{url}' failed: {e:?}");
        }
    }

    fn href(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }
}

fn current_query(window: &Window) -> String {
    window
        .location()
        .search()
        .map(|search| search.trim_start_matches('?').to_string())
        .unwrap_or_default()
}

/// Forwards back/forward navigation as [`DashboardEvent::UrlChanged`] while alive.
pub struct UrlWatcher {
    _listener: EventListener,
}

impl UrlWatcher {
    pub fn attach(dispatcher: Rc<dyn EventDispatcher>) -> SyncResult<Self> {
        let window = window()?;
        let target = window.clone();
        let listener = EventListener::new(&target, "popstate", move |_| {
            dispatcher.dispatch(DashboardEvent::UrlChanged(current_query(&window)));
        });
        Ok(Self { _listener: listener })
    }
}

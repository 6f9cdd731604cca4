//! JavaScript entry points. Thin bridge: every call becomes a command for the
//! runtime or a read of its snapshot.

use crate::application::{
    config::DashboardConfig,
    dashboard::{DashboardController, DashboardPorts},
};
use crate::domain::{
    errors::SyncError,
    events::{DashboardEvent, UserCommand},
    logging::LogComponent,
};
use crate::global_state;
use crate::infrastructure::{
    BrowserClock, BrowserSensorApi, BrowserSocketTransport, BrowserTimerScheduler, BrowserUrlHost,
    UrlWatcher,
};
use crate::log_info;
use crate::presentation::runtime::DashboardRuntime;
use gloo::utils::format::JsValueSerdeExt;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

const COMPONENT: LogComponent = LogComponent::Presentation("WasmApi");

impl From<SyncError> for JsValue {
    fn from(error: SyncError) -> Self {
        JsValue::from_str(&error.to_string())
    }
}

struct ActiveDashboard {
    runtime: Rc<DashboardRuntime>,
    _url_watcher: UrlWatcher,
}

thread_local! {
    static ACTIVE: RefCell<Option<ActiveDashboard>> = const { RefCell::new(None) };
}

fn active_runtime() -> Result<Rc<DashboardRuntime>, JsValue> {
    ACTIVE
        .with(|active| active.borrow().as_ref().map(|dashboard| Rc::clone(&dashboard.runtime)))
        .ok_or_else(|| JsValue::from_str("Dashboard is not started"))
}

fn command(command: UserCommand) -> Result<(), JsValue> {
    active_runtime()?.dispatch(DashboardEvent::Command(command));
    Ok(())
}

/// Starts (or restarts) the dashboard. `config` is a plain object; every
/// field is optional.
#[wasm_bindgen]
pub fn start_dashboard(config: JsValue) -> Result<(), JsValue> {
    let config: DashboardConfig = if config.is_undefined() || config.is_null() {
        DashboardConfig::default()
    } else {
        config.into_serde().map_err(|e| SyncError::Validation(format!("Invalid config: {e}")))?
    };
    stop_dashboard();

    let runtime = DashboardRuntime::new(global_state::publish);
    let dispatcher = runtime.dispatcher();
    let timers = BrowserTimerScheduler::new(Rc::clone(&dispatcher));
    let ports = DashboardPorts {
        transport: Box::new(BrowserSocketTransport::new(Rc::clone(&dispatcher))),
        stream_timers: Box::new(timers.clone()),
        url_host: Box::new(BrowserUrlHost::new()?),
        url_timers: Box::new(timers),
        api: Box::new(BrowserSensorApi::new(config.api_base(), Rc::clone(&dispatcher))),
        clock: Box::new(BrowserClock),
    };
    let controller = DashboardController::new(config, ports)?;
    let url_watcher = UrlWatcher::attach(dispatcher)?;

    runtime.install(controller);
    ACTIVE.with(|active| {
        *active.borrow_mut() = Some(ActiveDashboard { runtime: Rc::clone(&runtime), _url_watcher: url_watcher });
    });
    runtime.dispatch(DashboardEvent::Command(UserCommand::Start));
    log_info!(COMPONENT, "Dashboard started");
    Ok(())
}

/// Closes the stream and detaches every browser listener.
#[wasm_bindgen]
pub fn stop_dashboard() {
    let Some(active) = ACTIVE.with(|active| active.borrow_mut().take()) else {
        return;
    };
    active.runtime.dispatch(DashboardEvent::Command(UserCommand::Shutdown));
    active.runtime.remove();
    log_info!(COMPONENT, "Dashboard stopped");
}

#[wasm_bindgen]
pub fn add_sensor(name: String) -> Result<(), JsValue> {
    command(UserCommand::AddSensor(name))
}

#[wasm_bindgen]
pub fn remove_sensor(name: String) -> Result<(), JsValue> {
    command(UserCommand::RemoveSensor(name))
}

/// `start`/`end` as `YYYY-MM-DDTHH:MM` in the configured zone.
#[wasm_bindgen]
pub fn set_range(start: String, end: String) -> Result<(), JsValue> {
    command(UserCommand::SetLocalRange { start, end })
}

#[wasm_bindgen]
pub fn set_live_mode(live: bool) -> Result<(), JsValue> {
    command(UserCommand::SetLiveMode(live))
}

#[wasm_bindgen]
pub fn reset_dashboard() -> Result<(), JsValue> {
    command(UserCommand::ResetToDefaults)
}

#[wasm_bindgen]
pub fn dismiss_error() -> Result<(), JsValue> {
    command(UserCommand::DismissError)
}

#[wasm_bindgen]
pub fn send_message(payload: String) -> Result<(), JsValue> {
    active_runtime()?.with_controller_mut(|controller| controller.send(&payload))??;
    Ok(())
}

/// Current snapshot as a plain object.
#[wasm_bindgen]
pub fn dashboard_snapshot() -> Result<JsValue, JsValue> {
    let snapshot = active_runtime()?
        .snapshot()
        .ok_or_else(|| JsValue::from_str("Dashboard is busy"))?;
    JsValue::from_serde(&snapshot).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn shareable_url() -> Result<String, JsValue> {
    active_runtime()?
        .with_controller(DashboardController::shareable_url)
        .ok_or_else(|| JsValue::from_str("Dashboard is busy"))
}

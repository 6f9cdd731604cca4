use crate::application::ports::SensorApi;
use crate::domain::{
    errors::{SyncError, SyncResult},
    events::{DashboardEvent, EventDispatcher, HistoryRequest, SensorRequest},
    logging::LogComponent,
    sensor_data::{Reading, SensorId, SensorInfo, TimeRange},
};
use crate::{log_info, log_warn};
use gloo_net::http::{Request, Response};
use serde_json::Value;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;

const COMPONENT: LogComponent = LogComponent::Infrastructure("SensorApi");

/// REST client for `/api/sensors`. Responses come back as [`DashboardEvent`]s.
pub struct BrowserSensorApi {
    base_url: String,
    dispatcher: Rc<dyn EventDispatcher>,
}

impl BrowserSensorApi {
    pub fn new(base_url: &str, dispatcher: Rc<dyn EventDispatcher>) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), dispatcher }
    }

    fn sensor_url(&self, sensor: &SensorId) -> String {
        format!("{}/api/sensors/{}", self.base_url, urlencoding::encode(sensor.value()))
    }
}

impl SensorApi for BrowserSensorApi {
    fn fetch_sensor(&mut self, request: SensorRequest) {
        let url = self.sensor_url(&request.sensor);
        let dispatcher = Rc::clone(&self.dispatcher);
        spawn_local(async move {
            let result = get_sensor(&url, &request.sensor).await;
            dispatcher.dispatch(DashboardEvent::SensorLoaded { request, result });
        });
    }

    fn fetch_history(&mut self, request: HistoryRequest) {
        let url = format!("{}/weather", self.sensor_url(&request.sensor));
        let dispatcher = Rc::clone(&self.dispatcher);
        spawn_local(async move {
            let result = get_history(&url, &request.sensor, &request.ticket.range).await;
            dispatcher.dispatch(DashboardEvent::HistoryLoaded { request, result });
        });
    }
}

async fn send(request: Request) -> Result<Response, String> {
    request.send().await.map_err(|e| e.to_string())
}

async fn get_sensor(url: &str, sensor: &SensorId) -> SyncResult<SensorInfo> {
    let failed = |detail: String| SyncError::Fetch(format!("Failed to fetch sensor '{sensor}': {detail}"));

    let request = Request::get(url).header("Accept", "application/json").build().map_err(|e| failed(e.to_string()))?;
    let response = send(request).await.map_err(failed)?;
    if response.status() == 404 {
        return Err(SyncError::NotFound(sensor.to_string()));
    }
    if !response.ok() {
        return Err(failed(format!("HTTP {} {}", response.status(), response.status_text())));
    }
    response.json::<SensorInfo>().await.map_err(|e| failed(e.to_string()))
}

async fn get_history(url: &str, sensor: &SensorId, range: &TimeRange) -> SyncResult<Vec<Reading>> {
    let failed = |detail: String| SyncError::Fetch(format!("Failed to fetch weather data for '{sensor}': {detail}"));

    let start = range.start().to_wire();
    let end = range.end().to_wire();
    let request = Request::get(url)
        .query([("start", start.as_str()), ("end", end.as_str())])
        .header("Accept", "application/json")
        .build()
        .map_err(|e| failed(e.to_string()))?;
    let response = send(request).await.map_err(failed)?;
    if !response.ok() {
        return Err(failed(format!("HTTP {} {}", response.status(), response.status_text())));
    }

    let data: Value = response.json().await.map_err(|e| failed(e.to_string()))?;
    let readings = parse_history(data).map_err(failed)?;
    log_info!(COMPONENT, "Fetched {} reading(s) for {sensor} ({start} → {end})", readings.len());
    Ok(readings)
}

/// Array of readings; malformed items are skipped.
fn parse_history(data: Value) -> Result<Vec<Reading>, String> {
    let Value::Array(items) = data else {
        return Err("Response is not an array".to_string());
    };

    let mut readings = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Reading>(item) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                log_warn!(COMPONENT, "Skipping malformed reading: {e}");
            }
        }
    }
    Ok(readings)
}

//! Browser adapters for the application ports.

pub mod browser_url;
pub mod http;
pub mod services;
pub mod timers;
pub mod websocket;

pub use browser_url::{BrowserUrlHost, UrlWatcher};
pub use http::BrowserSensorApi;
pub use services::{BrowserClock, BrowserTimeProvider, ConsoleLogger};
pub use timers::BrowserTimerScheduler;
pub use websocket::BrowserSocketTransport;

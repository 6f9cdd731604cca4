use wasm_bindgen::prelude::*;

use crate::domain::logging::{LogComponent, get_logger};

pub mod application;
pub mod domain;
pub mod global_state;
pub mod infrastructure;
pub mod macros;
pub mod presentation;

/// Installs the panic hook, console logger and browser clock.
#[wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();

    #[cfg(debug_assertions)]
    let console_logger = infrastructure::services::ConsoleLogger::new_development();
    #[cfg(not(debug_assertions))]
    let console_logger = infrastructure::services::ConsoleLogger::new_production();
    domain::logging::init_logger(Box::new(console_logger));

    let browser_time_provider = Box::new(infrastructure::services::BrowserTimeProvider::new());
    domain::logging::init_time_provider(browser_time_provider);

    get_logger().info(LogComponent::Presentation("Initialize"), "Sensor dashboard module loaded");
}

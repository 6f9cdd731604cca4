pub mod runtime;
pub mod wasm_api;

pub use runtime::DashboardRuntime;

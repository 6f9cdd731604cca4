//! Sensor data aggregate: readings, sensor metadata and the merge service.

pub mod entities;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use services::*;
pub use value_objects::*;

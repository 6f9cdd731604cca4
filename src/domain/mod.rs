pub mod connection;
pub mod errors;
pub mod events;
pub mod logging;
pub mod sensor_data;
pub mod view_state;

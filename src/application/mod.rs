pub mod config;
pub mod dashboard;
pub mod ports;
pub mod stream_client;
pub mod url_codec;
pub mod url_sync;

pub use config::*;
pub use dashboard::*;
pub use ports::*;
pub use stream_client::*;
pub use url_codec::*;
pub use url_sync::*;

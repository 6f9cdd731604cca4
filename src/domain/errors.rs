/// Failure taxonomy of the synchronization core. Nothing here is fatal: every
/// variant degrades to a visible status plus continued best-effort operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Transient connection loss; retried up to the configured bound.
    Connection(String),
    /// One malformed frame; dropped without touching the connection.
    Parse(String),
    /// Batch request failure; surfaced, never retried automatically.
    Fetch(String),
    /// Requested sensor does not exist.
    NotFound(String),
    /// Rejected user input or configuration.
    Validation(String),
    /// `send` attempted while the stream is not connected.
    NotConnected,
    /// A browser API the adapters need is missing.
    Host(String),
}

impl SyncError {
    /// Connection-class errors are cleared once a connection opens again.
    pub fn is_connection(&self) -> bool {
        matches!(self, SyncError::Connection(_))
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Connection(msg) => write!(f, "{msg}"),
            SyncError::Parse(msg) => write!(f, "Malformed frame: {msg}"),
            SyncError::Fetch(msg) => write!(f, "{msg}"),
            SyncError::NotFound(sensor) => write!(f, "Sensor '{sensor}' not found"),
            SyncError::Validation(msg) => write!(f, "{msg}"),
            SyncError::NotConnected => write!(f, "Cannot send message, not connected"),
            SyncError::Host(msg) => write!(f, "Browser API unavailable: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        SyncError::Parse(error.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

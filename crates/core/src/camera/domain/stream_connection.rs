use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("camera URI is empty")]
    EmptyUri,
    #[error("failed to open stream {uri}: {reason}")]
    Open { uri: String, reason: String },
    #[error("stream {uri} has no video track")]
    NoVideoStream { uri: String },
    #[error("stream {uri} closed during warm-up")]
    ClosedDuringWarmup { uri: String },
}

/// Lifecycle of the connection owned by a frame source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// Open but no frame has arrived within the staleness threshold.
    Stale,
}

/// Opens connections to a remote video stream.
pub trait StreamConnector: Send {
    fn connect(&mut self, uri: &str) -> Result<Box<dyn StreamConnection>, ConnectError>;
}

/// Live handle to a remote video stream.
///
/// Reads never block indefinitely; transport failures surface as `None`
/// together with `is_open() == false`.
pub trait StreamConnection: Send {
    /// Next decoded frame, exactly as the transport delivered it.
    fn read_raw(&mut self) -> Option<Frame>;

    fn is_open(&self) -> bool;

    /// Releases transport resources. Safe to call more than once.
    fn close(&mut self);
}

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot encode {channels}-channel {width}x{height} frame")]
    Unsupported { width: u32, height: u32, channels: u8 },
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
    #[error("encoded frame is {size} bytes even at minimum quality (budget {budget})")]
    OverBudget { size: usize, budget: usize },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create capture directory {path}: {source}")]
    CreateDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write capture {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Compresses display frames and captures.
pub trait FrameEncoder: Send {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError>;
}

/// Continuous video transport, one encoded frame per tick.
pub trait VideoSink: Send {
    fn write_frame(&mut self, jpeg: &[u8]) -> std::io::Result<()>;

    /// One-off text part sent when the camera cannot be reached.
    fn write_error(&mut self, text: &str) -> std::io::Result<()>;
}

/// Persists a captured crop and returns the reference sent to the client.
pub trait CaptureStore: Send {
    fn save(&mut self, crop: &Frame) -> Result<String, StoreError>;
}

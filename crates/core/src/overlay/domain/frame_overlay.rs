use thiserror::Error;

use crate::overlay::domain::status_color::StatusColor;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to load overlay icon {path}: {source}")]
    Icon {
        path: std::path::PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("overlay expects a 3-channel frame, got {0} channels")]
    Channels(u8),
}

/// Draws operator feedback onto a display copy of a frame.
///
/// Never modifies the input frame, and never affects capture decisions.
pub trait FrameOverlay: Send {
    fn render(&self, frame: &Frame, color: StatusColor) -> Result<Frame, OverlayError>;
}

use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Given one frame, returns zero or more candidate faces with relative
/// bounding boxes. Implementations may keep model state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}

/// BlazeFace short-range model (subjects within ~2 m).
pub const NEAR_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// BlazeFace full-range "back camera" model (subjects within ~5 m).
pub const FAR_MODEL_NAME: &str = "blazeface_back.onnx";

/// Sleep between polls when the camera has no frame ready.
pub const NO_FRAME_POLL_MS: u64 = 10;

/// Boundary token of the multipart MJPEG video transport.
pub const MJPEG_BOUNDARY: &str = "frame";

/// Body of the one-off part sent when the camera never connected.
pub const CAMERA_ERROR_BODY: &str = "Error Connect Camera";

pub const CAPTURE_EXTENSION: &str = "jpg";

use serde::Serialize;

pub const IDLE_STATUS: &str = "idle";
pub const IDLE_MESSAGE: &str = "waiting for next scan";
pub const CAPTURE_FAILED_STATUS: &str = "error";
pub const CAPTURE_FAILED_MESSAGE: &str = "capture failed";

/// Outbound notification to the connected client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    FaceStatus { status: String, message: String },
    CaptureSuccess { url: String },
}

impl SessionEvent {
    pub fn face_status(status: &str, message: &str) -> Self {
        SessionEvent::FaceStatus {
            status: status.to_string(),
            message: message.to_string(),
        }
    }

    pub fn idle() -> Self {
        Self::face_status(IDLE_STATUS, IDLE_MESSAGE)
    }

    /// Sent instead of `capturing` when the crop could not be persisted.
    pub fn capture_failed() -> Self {
        Self::face_status(CAPTURE_FAILED_STATUS, CAPTURE_FAILED_MESSAGE)
    }

    /// Wire name of the event, e.g. `face_status`.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::FaceStatus { .. } => "face_status",
            SessionEvent::CaptureSuccess { .. } => "capture_success",
        }
    }
}

/// Receives session events in the order they were decided.
pub trait EventSink: Send {
    fn emit(&mut self, event: SessionEvent);
}

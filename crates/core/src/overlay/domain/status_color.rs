use crate::capture::domain::capture_state_machine::ZoneState;

/// Feedback colour shown to the subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusColor {
    Red,
    Yellow,
    Green,
}

impl StatusColor {
    /// Colour for the current zone state; `None` means idle (not armed).
    pub fn for_state(state: Option<ZoneState>) -> Self {
        match state {
            Some(ZoneState::Ready) | Some(ZoneState::Captured) => StatusColor::Green,
            Some(ZoneState::Adjusting(_)) => StatusColor::Yellow,
            Some(ZoneState::Waiting) | Some(ZoneState::MultipleDetected) | None => StatusColor::Red,
        }
    }

    /// Samples in BGR order, matching camera frames.
    pub fn bgr(&self) -> [u8; 3] {
        match self {
            StatusColor::Red => [0, 0, 255],
            StatusColor::Yellow => [0, 255, 255],
            StatusColor::Green => [0, 255, 0],
        }
    }
}

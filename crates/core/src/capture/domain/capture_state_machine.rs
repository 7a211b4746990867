use crate::capture::domain::target_zone::{QualityReason, QualityThresholds, TargetZone};
use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

pub const DEFAULT_REQUIRED_FRAMES: u32 = 30;

pub const WAITING_MESSAGE: &str = "please move into the frame";
pub const MULTIPLE_MESSAGE: &str = "proceed one at a time";
pub const CAPTURED_MESSAGE: &str = "capture complete";

/// Exactly one of these is reported per evaluated tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneState {
    /// No face inside the zone.
    Waiting,
    /// More than one face inside the zone.
    MultipleDetected,
    /// One face, failing the quality check.
    Adjusting(QualityReason),
    /// One face, passing; counting toward capture.
    Ready,
    /// Counter reached the threshold on this tick.
    Captured,
}

impl ZoneState {
    /// Wire name of the status reported to clients.
    pub fn status(&self) -> &'static str {
        match self {
            ZoneState::Waiting => "waiting",
            ZoneState::MultipleDetected => "error",
            ZoneState::Adjusting(_) => "adjusting",
            ZoneState::Ready => "ready",
            ZoneState::Captured => "capturing",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ZoneState::Waiting => WAITING_MESSAGE,
            ZoneState::MultipleDetected => MULTIPLE_MESSAGE,
            ZoneState::Adjusting(reason) => reason.message(),
            ZoneState::Ready => QualityReason::HoldStill.message(),
            ZoneState::Captured => CAPTURED_MESSAGE,
        }
    }
}

/// Result of evaluating one frame.
#[derive(Debug)]
pub struct TickDecision {
    pub state: ZoneState,
    /// The zone cut out of the unmodified frame; set only when `Captured`.
    pub crop: Option<Frame>,
}

impl TickDecision {
    pub fn status(&self) -> &'static str {
        self.state.status()
    }

    pub fn message(&self) -> &'static str {
        self.state.message()
    }
}

/// Debounced capture policy: a face must pass the quality check on
/// `required_frames` consecutive ticks before a crop is produced. Any
/// failing tick resets the count.
#[derive(Clone, Debug)]
pub struct CaptureStateMachine {
    zone: TargetZone,
    thresholds: QualityThresholds,
    required_frames: u32,
    consecutive_passes: u32,
}

impl CaptureStateMachine {
    pub fn new(zone: TargetZone, thresholds: QualityThresholds, required_frames: u32) -> Self {
        Self {
            zone,
            thresholds,
            required_frames: required_frames.max(1),
            consecutive_passes: 0,
        }
    }

    pub fn zone(&self) -> &TargetZone {
        &self.zone
    }

    pub fn consecutive_passes(&self) -> u32 {
        self.consecutive_passes
    }

    pub fn reset(&mut self) {
        self.consecutive_passes = 0;
    }

    /// Evaluates one frame's detections against the zone.
    ///
    /// Malformed boxes are ignored. Faces whose center is outside the zone
    /// do not count toward any state.
    pub fn evaluate(&mut self, frame: &Frame, detections: &[Detection]) -> TickDecision {
        let mut in_zone = detections
            .iter()
            .filter(|d| d.bbox.is_well_formed() && self.zone.contains(d));

        let (first, second) = (in_zone.next(), in_zone.next());
        let state = match (first, second) {
            (None, _) => {
                self.reset();
                ZoneState::Waiting
            }
            (Some(_), Some(_)) => {
                self.reset();
                ZoneState::MultipleDetected
            }
            (Some(face), None) => {
                let verdict = self.zone.quality_check(face, &self.thresholds);
                if !verdict.ok {
                    self.reset();
                    ZoneState::Adjusting(verdict.reason)
                } else {
                    self.consecutive_passes += 1;
                    if self.consecutive_passes >= self.required_frames {
                        self.reset();
                        ZoneState::Captured
                    } else {
                        ZoneState::Ready
                    }
                }
            }
        };

        let crop = match state {
            ZoneState::Captured => {
                let z = &self.zone;
                let crop = frame.crop(z.x, z.y, z.width, z.height);
                if crop.is_none() {
                    log::warn!("Zone {z:?} does not intersect frame {}x{}", frame.width(), frame.height());
                }
                crop
            }
            _ => None,
        };

        TickDecision { state, crop }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelOrder;
    use rstest::rstest;

    fn frame() -> Frame {
        // Each pixel stores (row % 256, col % 256, 7) so crops can be located.
        let (w, h) = (640u32, 480u32);
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for row in 0..h {
            for col in 0..w {
                data.extend_from_slice(&[(row % 256) as u8, (col % 256) as u8, 7]);
            }
        }
        Frame::new(data, w, h, 3, PixelOrder::Bgr, 0)
    }

    fn px(x: f64, y: f64, w: f64, h: f64) -> Detection {
        Detection::new(
            (x + 0.5) / 640.0,
            (y + 0.5) / 480.0,
            (w + 0.5) / 640.0,
            (h + 0.5) / 480.0,
            0.9,
        )
    }

    fn good() -> Detection {
        px(256.0, 176.0, 128.0, 128.0)
    }

    fn too_small() -> Detection {
        px(275.0, 190.0, 90.0, 100.0)
    }

    fn outside() -> Detection {
        px(10.0, 10.0, 100.0, 100.0)
    }

    fn machine(required: u32) -> CaptureStateMachine {
        CaptureStateMachine::new(
            TargetZone::centered(640, 480, 180, 260),
            QualityThresholds::default(),
            required,
        )
    }

    #[test]
    fn test_capture_fires_exactly_on_threshold() {
        let f = frame();
        let mut m = machine(30);
        for tick in 1..30 {
            let d = m.evaluate(&f, &[good()]);
            assert_eq!(d.state, ZoneState::Ready, "tick {tick}");
            assert!(d.crop.is_none());
            assert_eq!(m.consecutive_passes(), tick);
        }
        let d = m.evaluate(&f, &[good()]);
        assert_eq!(d.state, ZoneState::Captured);
        assert_eq!(d.status(), "capturing");
        assert!(d.crop.is_some());
        assert_eq!(m.consecutive_passes(), 0);
    }

    #[test]
    fn test_crop_is_fixed_zone_of_unmodified_frame() {
        let f = frame();
        let mut m = machine(1);
        // Face box noise must not influence the crop.
        let d = m.evaluate(&f, &[px(260.0, 170.0, 120.0, 140.0)]);
        let crop = d.crop.unwrap();
        assert_eq!((crop.width(), crop.height()), (180, 260));
        let arr = crop.as_ndarray();
        // Top-left is pixel (row 110, col 230); bottom-right is (369, 409).
        assert_eq!(arr[[0, 0, 0]], 110);
        assert_eq!(arr[[0, 0, 1]], 230);
        assert_eq!(arr[[259, 179, 0]], (369 % 256) as u8);
        assert_eq!(arr[[259, 179, 1]], (409 % 256) as u8);
    }

    #[rstest]
    #[case::no_face(vec![], ZoneState::Waiting)]
    #[case::face_outside(vec![outside()], ZoneState::Waiting)]
    #[case::two_faces(vec![good(), px(300.0, 200.0, 60.0, 60.0)], ZoneState::MultipleDetected)]
    #[case::small_face(vec![too_small()], ZoneState::Adjusting(QualityReason::MoveCloser))]
    fn test_failing_tick_resets_counter(#[case] dets: Vec<Detection>, #[case] expected: ZoneState) {
        let f = frame();
        let mut m = machine(30);
        for _ in 0..5 {
            m.evaluate(&f, &[good()]);
        }
        assert_eq!(m.consecutive_passes(), 5);

        let d = m.evaluate(&f, &dets);
        assert_eq!(d.state, expected);
        assert!(d.crop.is_none());
        assert_eq!(m.consecutive_passes(), 0);

        m.evaluate(&f, &[good()]);
        assert_eq!(m.consecutive_passes(), 1);
    }

    #[test]
    fn test_outside_faces_do_not_count_as_multiple() {
        let f = frame();
        let mut m = machine(30);
        let d = m.evaluate(&f, &[good(), outside()]);
        assert_eq!(d.state, ZoneState::Ready);
    }

    #[test]
    fn test_malformed_detection_is_ignored() {
        let f = frame();
        let mut m = machine(30);
        let bad = Detection::new(f64::NAN, 0.5, 0.2, 0.2, 0.9);
        let d = m.evaluate(&f, &[bad]);
        assert_eq!(d.state, ZoneState::Waiting);
    }

    #[test]
    fn test_status_and_message_strings() {
        assert_eq!(ZoneState::Waiting.status(), "waiting");
        assert_eq!(ZoneState::MultipleDetected.status(), "error");
        assert_eq!(ZoneState::MultipleDetected.message(), "proceed one at a time");
        assert_eq!(ZoneState::Adjusting(QualityReason::MoveBack).status(), "adjusting");
        assert_eq!(ZoneState::Adjusting(QualityReason::MoveBack).message(), "move back");
        assert_eq!(ZoneState::Ready.status(), "ready");
        assert_eq!(ZoneState::Ready.message(), "hold still");
    }

    #[test]
    fn test_reset_clears_partial_credit() {
        let f = frame();
        let mut m = machine(3);
        m.evaluate(&f, &[good()]);
        m.evaluate(&f, &[good()]);
        m.reset();
        assert_eq!(m.evaluate(&f, &[good()]).state, ZoneState::Ready);
        assert_eq!(m.evaluate(&f, &[good()]).state, ZoneState::Ready);
        assert_eq!(m.evaluate(&f, &[good()]).state, ZoneState::Captured);
    }

    #[test]
    fn test_zero_required_frames_is_treated_as_one() {
        let f = frame();
        let mut m = machine(0);
        assert_eq!(m.evaluate(&f, &[good()]).state, ZoneState::Captured);
    }
}

use crate::detection::domain::detection::{Detection, PixelBox};

/// Why a single in-zone face does or does not qualify for capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualityReason {
    MoveToCenter,
    MoveCloser,
    MoveBack,
    HoldStill,
}

impl QualityReason {
    pub fn message(&self) -> &'static str {
        match self {
            QualityReason::MoveToCenter => "move to center",
            QualityReason::MoveCloser => "move closer",
            QualityReason::MoveBack => "move back",
            QualityReason::HoldStill => "hold still",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityVerdict {
    pub ok: bool,
    pub reason: QualityReason,
}

/// Thresholds applied by [`TargetZone::quality_check`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityThresholds {
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub center_tolerance: i32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_ratio: 0.6,
            max_ratio: 0.9,
            center_tolerance: 50,
        }
    }
}

/// Fixed rectangle, in output-frame pixels, a subject must occupy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetZone {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl TargetZone {
    /// Centers a `zone_width × zone_height` rectangle in the frame. A zone
    /// larger than the frame is shrunk to fit.
    pub fn centered(frame_width: u32, frame_height: u32, zone_width: u32, zone_height: u32) -> Self {
        let w = zone_width.min(frame_width);
        let h = zone_height.min(frame_height);
        Self {
            x: ((frame_width - w) / 2) as i32,
            y: ((frame_height - h) / 2) as i32,
            width: w as i32,
            height: h as i32,
            frame_width,
            frame_height,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    fn to_pixels(&self, detection: &Detection) -> PixelBox {
        detection.bbox.to_pixels(self.frame_width, self.frame_height)
    }

    /// True when the detection's center lies strictly inside the zone.
    /// A center on any edge is outside.
    pub fn contains(&self, detection: &Detection) -> bool {
        let (cx, cy) = self.to_pixels(detection).center();
        self.x < cx && cx < self.x + self.width && self.y < cy && cy < self.y + self.height
    }

    /// Centering first, then size ratio; the first failing check wins.
    pub fn quality_check(&self, detection: &Detection, t: &QualityThresholds) -> QualityVerdict {
        let face = self.to_pixels(detection);
        let (face_cx, _) = face.center();
        let (zone_cx, _) = self.center();

        if (face_cx - zone_cx).abs() > t.center_tolerance {
            return QualityVerdict {
                ok: false,
                reason: QualityReason::MoveToCenter,
            };
        }

        let ratio = face.width as f64 / self.width as f64;
        if ratio < t.min_ratio {
            return QualityVerdict {
                ok: false,
                reason: QualityReason::MoveCloser,
            };
        }
        if ratio > t.max_ratio {
            return QualityVerdict {
                ok: false,
                reason: QualityReason::MoveBack,
            };
        }

        QualityVerdict {
            ok: true,
            reason: QualityReason::HoldStill,
        }
    }
}

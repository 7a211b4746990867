use serde::{Deserialize, Serialize};

/// Bounding box expressed as fractions of the frame dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeBox {
    pub xmin: f64,
    pub ymin: f64,
    pub width: f64,
    pub height: f64,
}

/// Bounding box in pixel space of a particular frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelBox {
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

impl RelativeBox {
    /// Converts to pixels, truncating each component toward zero.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> PixelBox {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        PixelBox {
            x: (self.xmin * fw) as i32,
            y: (self.ymin * fh) as i32,
            width: (self.width * fw) as i32,
            height: (self.height * fh) as i32,
        }
    }

    /// True when every component is finite and the extent is non-negative.
    pub fn is_well_formed(&self) -> bool {
        [self.xmin, self.ymin, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// One candidate face produced by a detector for a single frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: RelativeBox,
    pub confidence: f64,
}

impl Detection {
    pub fn new(xmin: f64, ymin: f64, width: f64, height: f64, confidence: f64) -> Self {
        Self {
            bbox: RelativeBox {
                xmin,
                ymin,
                width,
                height,
            },
            confidence,
        }
    }
}

/// Detector operating range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    /// Subjects within about two metres.
    Near,
    /// Subjects within about five metres.
    Far,
}

impl std::fmt::Display for DetectorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorMode::Near => write!(f, "near"),
            DetectorMode::Far => write!(f, "far"),
        }
    }
}

impl std::str::FromStr for DetectorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "near" | "0" => Ok(DetectorMode::Near),
            "far" | "1" => Ok(DetectorMode::Far),
            other => Err(format!("detector mode must be 'near' or 'far', got '{other}'")),
        }
    }
}

//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! Supports the short-range model for subjects close to the kiosk and the
//! full-range ("back camera") model for subjects further away. Both emit
//! 896 anchors; only the input resolution and anchor strides differ.
use std::path::Path;

use crate::detection::domain::detection::{Detection, DetectorMode};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::{Frame, PixelOrder};

const NMS_IOU_THRESH: f64 = 0.3;

const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: 4 box values + 6 keypoints.
const REGRESSOR_STRIDE: usize = 16;

/// Input resolution and `(stride, anchors_per_cell)` layers per model.
struct ModelGeometry {
    input_size: u32,
    layers: [(usize, usize); 2],
}

impl ModelGeometry {
    fn for_mode(mode: DetectorMode) -> Self {
        match mode {
            DetectorMode::Near => Self {
                input_size: 128,
                layers: [(8, 2), (16, 6)],
            },
            DetectorMode::Far => Self {
                input_size: 256,
                layers: [(16, 2), (32, 6)],
            },
        }
    }
}

/// BlazeFace detector backed by an ONNX Runtime session.
///
/// Built once at startup and owned by the session loop.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    pub fn new(
        model_path: &Path,
        mode: DetectorMode,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        let geometry = ModelGeometry::for_mode(mode);
        log::info!(
            "Loaded BlazeFace {mode} model from {} ({}x{} input)",
            model_path.display(),
            geometry.input_size,
            geometry.input_size
        );
        Ok(Self {
            session,
            confidence,
            input_size: geometry.input_size,
            anchors: generate_anchors(&geometry),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let input_tensor = preprocess(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut raw = decode(
            reg_data,
            score_data,
            &self.anchors,
            self.input_size as f32,
            self.confidence as f32,
        );
        let kept = nms(&mut raw, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .map(|d| Detection::new(d.x1, d.y1, d.x2 - d.x1, d.y2 - d.y1, d.score))
            .collect())
    }
}

/// Session with the platform's accelerated provider registered first;
/// ONNX Runtime falls back to CPU when it is unavailable.
fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let builder = ort::session::Session::builder()?;
    #[cfg(target_os = "macos")]
    let builder = builder.with_execution_providers([
        ort::execution_providers::CoreMLExecutionProvider::default().build(),
    ])?;
    #[cfg(target_os = "windows")]
    let builder = builder.with_execution_providers([
        ort::execution_providers::DirectMLExecutionProvider::default().build(),
    ])?;
    Ok(builder.commit_from_file(model_path)?)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32 in RGB order.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;
    let rgb_channel: [usize; 3] = match frame.order() {
        PixelOrder::Rgb => [0, 1, 2],
        PixelOrder::Bgr => [2, 1, 0],
    };

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for (c, &src_c) in rgb_channel.iter().enumerate() {
                tensor[[0, c, y, x]] = src[[src_y, src_x, src_c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchors and decoding
// ---------------------------------------------------------------------------

fn generate_anchors(geometry: &ModelGeometry) -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &geometry.layers {
        let grid_size = geometry.input_size as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

/// Candidate box in relative `[0,1]` coordinates.
#[derive(Clone, Debug)]
struct RawDet {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
}

fn decode(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    input_size: f32,
    confidence: f32,
) -> Vec<RawDet> {
    let mut dets = Vec::new();
    let num_anchors = anchors.len().min(NUM_ANCHORS);

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score);
        if score < confidence {
            continue;
        }

        let off = i * REGRESSOR_STRIDE;
        if off + 4 > reg_data.len() {
            break;
        }

        let anchor = anchors[i];
        let cx = anchor[0] + reg_data[off] / input_size;
        let cy = anchor[1] + reg_data[off + 1] / input_size;
        let w = reg_data[off + 2] / input_size;
        let h = reg_data[off + 3] / input_size;

        let x1 = (cx - w / 2.0).clamp(0.0, 1.0);
        let y1 = (cy - h / 2.0).clamp(0.0, 1.0);
        let x2 = (cx + w / 2.0).clamp(0.0, 1.0);
        let y2 = (cy + h / 2.0).clamp(0.0, 1.0);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        dets.push(RawDet {
            x1: x1 as f64,
            y1: y1 as f64,
            x2: x2 as f64,
            y2: y2 as f64,
            score: score as f64,
        });
    }

    dets
}

fn nms(dets: &mut [RawDet], iou_thresh: f64) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

use std::path::Path;

use crate::capture::domain::target_zone::TargetZone;
use crate::overlay::domain::frame_overlay::{FrameOverlay, OverlayError};
use crate::overlay::domain::status_color::StatusColor;
use crate::shared::config::OverlayConfig;
use crate::shared::frame::Frame;

/// Largest icon edge as a fraction of the zone width.
const ICON_SCALE: f32 = 0.4;

const ZONE_FILL_BGR: [u8; 3] = [255, 255, 255];

/// CPU overlay: translucent zone fill, guide ellipse and an optional
/// status-tinted icon, all alpha-blended per pixel.
pub struct CpuOverlayRenderer {
    zone: TargetZone,
    fill_opacity: f32,
    ellipse_opacity: f32,
    ellipse_offset: i32,
    ellipse_thickness: i32,
    icon: Option<image::RgbaImage>,
}

impl CpuOverlayRenderer {
    pub fn new(zone: TargetZone, config: &OverlayConfig) -> Result<Self, OverlayError> {
        let icon = match &config.icon_path {
            Some(path) => Some(load_icon(path, &zone)?),
            None => None,
        };
        Ok(Self {
            zone,
            fill_opacity: config.zone_fill_opacity,
            ellipse_opacity: config.ellipse_opacity,
            ellipse_offset: config.ellipse_offset,
            ellipse_thickness: config.ellipse_thickness.max(1),
            icon,
        })
    }

    fn fill_zone(&self, data: &mut [u8], fw: usize) {
        if self.fill_opacity <= 0.0 {
            return;
        }
        let z = &self.zone;
        for row in z.y.max(0)..z.y + z.height {
            for col in z.x.max(0)..z.x + z.width {
                let off = (row as usize * fw + col as usize) * 3;
                blend(&mut data[off..off + 3], ZONE_FILL_BGR, self.fill_opacity);
            }
        }
    }

    fn draw_ellipse(&self, data: &mut [u8], fw: usize, fh: usize, color: [u8; 3]) {
        if self.ellipse_opacity <= 0.0 {
            return;
        }
        let (cx, cy) = self.zone.center();
        let a = (self.zone.width / 2 - self.ellipse_offset) as f64;
        let b = (self.zone.height / 2 - self.ellipse_offset) as f64;
        if a <= 0.0 || b <= 0.0 {
            return;
        }

        let half = self.ellipse_thickness as f64 / 2.0;
        let (outer_a, outer_b) = (a + half, b + half);
        let (inner_a, inner_b) = ((a - half).max(0.0), (b - half).max(0.0));

        let x0 = (cx as f64 - outer_a).floor().max(0.0) as usize;
        let x1 = ((cx as f64 + outer_a).ceil() as usize).min(fw.saturating_sub(1));
        let y0 = (cy as f64 - outer_b).floor().max(0.0) as usize;
        let y1 = ((cy as f64 + outer_b).ceil() as usize).min(fh.saturating_sub(1));

        for row in y0..=y1 {
            let dy = row as f64 - cy as f64;
            for col in x0..=x1 {
                let dx = col as f64 - cx as f64;
                let outside_inner = inner_a <= 0.0
                    || inner_b <= 0.0
                    || dx * dx / (inner_a * inner_a) + dy * dy / (inner_b * inner_b) > 1.0;
                let inside_outer =
                    dx * dx / (outer_a * outer_a) + dy * dy / (outer_b * outer_b) <= 1.0;
                if inside_outer && outside_inner {
                    let off = (row * fw + col) * 3;
                    blend(&mut data[off..off + 3], color, self.ellipse_opacity);
                }
            }
        }
    }

    fn draw_icon(&self, data: &mut [u8], fw: usize, fh: usize, color: [u8; 3]) {
        let Some(icon) = &self.icon else {
            return;
        };
        let (cx, cy) = self.zone.center();
        let left = cx - icon.width() as i32 / 2;
        let top = cy - icon.height() as i32 / 2;

        for (ix, iy, px) in icon.enumerate_pixels() {
            let col = left + ix as i32;
            let row = top + iy as i32;
            if col < 0 || row < 0 || col as usize >= fw || row as usize >= fh {
                continue;
            }
            let alpha = px.0[3] as f32 / 255.0;
            if alpha <= 0.0 {
                continue;
            }
            // Tint: keep the icon's luminance, take the hue from the status colour.
            let luma = (0.299 * px.0[0] as f32 + 0.587 * px.0[1] as f32 + 0.114 * px.0[2] as f32)
                / 255.0;
            let tinted = color.map(|c| (c as f32 * luma).round() as u8);
            let off = (row as usize * fw + col as usize) * 3;
            blend(&mut data[off..off + 3], tinted, alpha);
        }
    }
}

impl FrameOverlay for CpuOverlayRenderer {
    fn render(&self, frame: &Frame, color: StatusColor) -> Result<Frame, OverlayError> {
        if frame.channels() != 3 {
            return Err(OverlayError::Channels(frame.channels()));
        }
        let fw = frame.width() as usize;
        let fh = frame.height() as usize;
        let mut out = frame.clone();
        let data = out.data_mut();

        // Frames smaller than the zone geometry pass through undecorated.
        if self.zone.x + self.zone.width > fw as i32 || self.zone.y + self.zone.height > fh as i32 {
            return Ok(out);
        }

        self.fill_zone(data, fw);
        self.draw_ellipse(data, fw, fh, color.bgr());
        self.draw_icon(data, fw, fh, color.bgr());
        Ok(out)
    }
}

fn load_icon(path: &Path, zone: &TargetZone) -> Result<image::RgbaImage, OverlayError> {
    let icon = image::open(path)
        .map_err(|e| OverlayError::Icon {
            path: path.to_path_buf(),
            source: e,
        })?
        .to_rgba8();

    let max_edge = (zone.width as f32 * ICON_SCALE).max(1.0);
    let scale = (max_edge / icon.width().max(icon.height()) as f32).min(1.0);
    if scale >= 1.0 {
        return Ok(icon);
    }
    let w = ((icon.width() as f32 * scale).round() as u32).max(1);
    let h = ((icon.height() as f32 * scale).round() as u32).max(1);
    log::debug!("Scaling overlay icon {} to {w}x{h}", path.display());
    Ok(image::imageops::resize(&icon, w, h, image::imageops::FilterType::Triangle))
}

fn blend(dst: &mut [u8], src: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    for (d, s) in dst.iter_mut().zip(src) {
        *d = (s as f32 * alpha + *d as f32 * (1.0 - alpha)).round() as u8;
    }
}

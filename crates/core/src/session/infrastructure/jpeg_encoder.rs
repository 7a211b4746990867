use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use crate::session::domain::media_ports::{EncodeError, FrameEncoder};
use crate::shared::frame::Frame;

/// Lowest quality tried when fitting a byte budget.
const MIN_QUALITY: u8 = 10;
const QUALITY_STEP: u8 = 10;

/// JPEG encoding via the `image` crate, with an optional size budget.
pub struct JpegEncoder {
    quality: u8,
    /// 0 = unlimited.
    max_bytes: usize,
}

impl JpegEncoder {
    pub fn new(quality: u8, max_bytes: usize) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            max_bytes,
        }
    }

    fn encode_at(&self, rgb: &[u8], frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        ImageJpegEncoder::new_with_quality(&mut out, quality).encode(
            rgb,
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        if frame.channels() != 3 || frame.width() == 0 || frame.height() == 0 {
            return Err(EncodeError::Unsupported {
                width: frame.width(),
                height: frame.height(),
                channels: frame.channels(),
            });
        }
        let rgb = frame.to_rgb_bytes();

        let mut quality = self.quality;
        loop {
            let bytes = self.encode_at(&rgb, frame, quality)?;
            if self.max_bytes == 0 || bytes.len() <= self.max_bytes {
                return Ok(bytes);
            }
            if quality <= MIN_QUALITY {
                return Err(EncodeError::OverBudget {
                    size: bytes.len(),
                    budget: self.max_bytes,
                });
            }
            quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
            log::debug!("Frame is {} bytes, retrying at quality {quality}", bytes.len());
        }
    }
}

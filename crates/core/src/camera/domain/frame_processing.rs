use crate::shared::frame::{swap_red_blue, Frame, PixelOrder};

/// Brings a raw camera frame into the form the rest of the kiosk expects:
/// BGR order, `width × height`, mirrored horizontally. Steps always run in
/// that order.
///
/// Returns `None` for frames that are not packed 3-channel images; the
/// caller treats them like a missed read.
pub fn post_process(frame: Frame, width: u32, height: u32, index: usize) -> Option<Frame> {
    if frame.channels() != 3 {
        log::warn!(
            "Dropping camera frame with {} channels, expected 3",
            frame.channels()
        );
        return None;
    }
    let expected = frame.width() as usize * frame.height() as usize * 3;
    if frame.data().len() != expected {
        log::warn!(
            "Dropping camera frame with {} bytes, expected {expected}",
            frame.data().len()
        );
        return None;
    }

    let captured_at = frame.captured_at();
    let frame = to_bgr(frame);
    let frame = resize(frame, width, height)?;
    let mut data = frame.into_data();
    mirror_horizontal(&mut data, width, height, 3);
    Some(Frame::new(data, width, height, 3, PixelOrder::Bgr, index).with_captured_at(captured_at))
}

fn to_bgr(frame: Frame) -> Frame {
    if frame.order() == PixelOrder::Bgr {
        return frame;
    }
    let (w, h, index, at) = (
        frame.width(),
        frame.height(),
        frame.index(),
        frame.captured_at(),
    );
    let mut data = frame.into_data();
    swap_red_blue(&mut data, 3);
    Frame::new(data, w, h, 3, PixelOrder::Bgr, index).with_captured_at(at)
}

fn resize(frame: Frame, width: u32, height: u32) -> Option<Frame> {
    if frame.width() == width && frame.height() == height {
        return Some(frame);
    }
    let (w, h, index, order, at) = (
        frame.width(),
        frame.height(),
        frame.index(),
        frame.order(),
        frame.captured_at(),
    );
    // Channel order is irrelevant to the resampler, so BGR passes through an RgbImage untouched.
    let Some(img) = image::RgbImage::from_raw(w, h, frame.into_data()) else {
        log::warn!("Dropping camera frame: {w}x{h} buffer rejected by resampler");
        return None;
    };
    let resized = image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
    Some(Frame::new(resized.into_raw(), width, height, 3, order, index).with_captured_at(at))
}

/// Flips a packed frame buffer left-to-right in place.
pub fn mirror_horizontal(data: &mut [u8], width: u32, height: u32, channels: usize) {
    let w = width as usize;
    let row_len = w * channels;
    for row in data.chunks_exact_mut(row_len).take(height as usize) {
        for x in 0..w / 2 {
            let left = x * channels;
            let right = (w - 1 - x) * channels;
            for c in 0..channels {
                row.swap(left + c, right + c);
            }
        }
    }
}

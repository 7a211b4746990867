use crate::camera::domain::stream_connection::{ConnectError, StreamConnection, StreamConnector};
use crate::shared::config::CameraConfig;
use crate::shared::frame::{Frame, PixelOrder};

/// Packets examined per `read_raw` call before giving up on this tick.
const MAX_PACKETS_PER_READ: usize = 64;

/// Opens network video streams (RTSP, HTTP, files) via ffmpeg-next.
pub struct FfmpegConnector {
    rtsp_transport: String,
    timeout_us: u64,
}

impl FfmpegConnector {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            rtsp_transport: config.rtsp_transport.clone(),
            timeout_us: config.read_timeout().as_micros() as u64,
        }
    }

    fn options(&self, uri: &str) -> ffmpeg_next::Dictionary<'static> {
        let mut opts = ffmpeg_next::Dictionary::new();
        if uri.starts_with("rtsp://") || uri.starts_with("rtsps://") {
            opts.set("rtsp_transport", &self.rtsp_transport);
            opts.set("timeout", &self.timeout_us.to_string());
        }
        if self.timeout_us > 0 {
            opts.set("rw_timeout", &self.timeout_us.to_string());
        }
        opts
    }
}

impl StreamConnector for FfmpegConnector {
    fn connect(&mut self, uri: &str) -> Result<Box<dyn StreamConnection>, ConnectError> {
        if uri.trim().is_empty() {
            return Err(ConnectError::EmptyUri);
        }
        let open_err = |e: ffmpeg_next::Error| ConnectError::Open {
            uri: uri.to_string(),
            reason: e.to_string(),
        };

        ffmpeg_next::init().map_err(open_err)?;
        let ictx = ffmpeg_next::format::input_with_dictionary(uri, self.options(uri))
            .map_err(open_err)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| ConnectError::NoVideoStream {
                uri: uri.to_string(),
            })?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(open_err)?;
        let decoder = codec_ctx.decoder().video().map_err(open_err)?;

        log::debug!(
            "Opened {uri}: {}x{} {:?}",
            decoder.width(),
            decoder.height(),
            decoder.format()
        );

        Ok(Box::new(FfmpegConnection {
            ictx,
            decoder,
            scaler: None,
            video_stream_index,
            open: true,
        }))
    }
}

struct Scaler {
    context: ffmpeg_next::software::scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

/// One live ffmpeg demuxer/decoder pair producing BGR24 frames.
struct FfmpegConnection {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<Scaler>,
    video_stream_index: usize,
    open: bool,
}

// Safety: a connection is owned by exactly one FrameSource and only touched
// from the streaming thread. The raw ffmpeg pointers are never shared.
unsafe impl Send for FfmpegConnection {}

impl FfmpegConnection {
    fn try_receive(&mut self) -> Option<Frame> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let (format, width, height) = (decoded.format(), decoded.width(), decoded.height());
        let needs_scaler = self
            .scaler
            .as_ref()
            .map_or(true, |s| s.format != format || s.width != width || s.height != height);
        if needs_scaler {
            match ffmpeg_next::software::scaling::Context::get(
                format,
                width,
                height,
                ffmpeg_next::format::Pixel::BGR24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            ) {
                Ok(context) => {
                    self.scaler = Some(Scaler {
                        context,
                        format,
                        width,
                        height,
                    })
                }
                Err(e) => {
                    log::warn!("Cannot build scaler for {format:?} {width}x{height}: {e}");
                    return None;
                }
            }
        }

        let scaler = self.scaler.as_mut()?;
        let mut bgr = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = scaler.context.run(&decoded, &mut bgr) {
            log::warn!("Frame conversion failed: {e}");
            return None;
        }

        let pixels = extract_packed_pixels(&bgr, width, height);
        Some(Frame::new(pixels, width, height, 3, PixelOrder::Bgr, 0))
    }
}

impl StreamConnection for FfmpegConnection {
    fn read_raw(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        if let Some(frame) = self.try_receive() {
            return Some(frame);
        }

        for _ in 0..MAX_PACKETS_PER_READ {
            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                }) => return None,
                Err(e) => {
                    log::warn!("Camera stream read failed: {e}");
                    self.open = false;
                    return None;
                }
            }

            if packet.stream() != self.video_stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable packet: {e}");
                continue;
            }
            if let Some(frame) = self.try_receive() {
                return Some(frame);
            }
        }
        None
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Copies pixel data from an ffmpeg frame into a tightly packed 3-channel buffer.
///
/// ffmpeg rows may carry padding (stride > width*3); it is stripped here.
fn extract_packed_pixels(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_len]);
    }
    pixels
}

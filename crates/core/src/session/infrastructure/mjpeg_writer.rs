use std::io::Write;

use crate::session::domain::media_ports::VideoSink;
use crate::shared::constants::MJPEG_BOUNDARY;

/// Content type announced for the multipart stream.
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}")
}

/// Writes frames as a `multipart/x-mixed-replace` MJPEG body.
pub struct MjpegWriter<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> MjpegWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_part(&mut self, content_type: &str, body: &[u8]) -> std::io::Result<()> {
        write!(
            self.out,
            "--{MJPEG_BOUNDARY}\r\nContent-Type: {content_type}\r\n\r\n"
        )?;
        self.out.write_all(body)?;
        self.out.write_all(b"\r\n")?;
        self.out.flush()
    }
}

impl<W: Write + Send> VideoSink for MjpegWriter<W> {
    fn write_frame(&mut self, jpeg: &[u8]) -> std::io::Result<()> {
        self.write_part("image/jpeg", jpeg)
    }

    fn write_error(&mut self, text: &str) -> std::io::Result<()> {
        self.write_part("text/plain", text.as_bytes())
    }
}

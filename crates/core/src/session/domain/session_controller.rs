use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::camera::domain::frame_source::FrameSource;
use crate::camera::domain::stream_connection::ConnectError;
use crate::capture::domain::capture_state_machine::CaptureStateMachine;
use crate::detection::domain::face_detector::FaceDetector;
use crate::overlay::domain::frame_overlay::FrameOverlay;
use crate::overlay::domain::status_color::StatusColor;
use crate::session::domain::media_ports::{CaptureStore, FrameEncoder, VideoSink};
use crate::session::domain::session_event::{EventSink, SessionEvent};
use crate::shared::constants::{CAMERA_ERROR_BODY, NO_FRAME_POLL_MS};
use crate::shared::frame::Frame;

/// Log a progress line every this many streamed frames.
const LOG_EVERY_FRAMES: u64 = 300;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(#[source] ConnectError),
}

/// Mutable state shared by the streaming loop and command handlers.
struct CaptureSession {
    armed: bool,
    machine: CaptureStateMachine,
}

/// Cloneable handle used by command handlers to arm and disarm capture.
///
/// Every mutation happens under the same lock the streaming loop holds for
/// the whole of a tick, so a disarm can never land halfway through one.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<CaptureSession>>,
    events: Arc<Mutex<Box<dyn EventSink>>>,
}

impl SessionHandle {
    fn new(machine: CaptureStateMachine, events: Box<dyn EventSink>) -> Self {
        Self {
            session: Arc::new(Mutex::new(CaptureSession {
                armed: false,
                machine,
            })),
            events: Arc::new(Mutex::new(events)),
        }
    }

    /// Starts an armed period with a fresh success counter.
    pub fn arm(&self) {
        let mut session = lock(&self.session);
        session.armed = true;
        session.machine.reset();
        log::info!("Capture armed");
    }

    /// Ends the armed period and tells the client the kiosk is idle.
    pub fn disarm(&self) {
        let mut session = lock(&self.session);
        session.armed = false;
        session.machine.reset();
        log::info!("Capture disarmed");
        emit(&self.events, SessionEvent::idle());
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.session).armed
    }

    pub fn consecutive_passes(&self) -> u32 {
        lock(&self.session).machine.consecutive_passes()
    }
}

/// What one tick of the streaming loop did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The camera had nothing this tick.
    NoFrame,
    /// A frame was written to the video sink.
    Streamed,
    /// A frame was read but could not be encoded.
    Skipped,
}

/// Collaborators the controller drives each tick.
pub struct SessionParts {
    pub source: FrameSource,
    pub detector: Box<dyn FaceDetector>,
    pub overlay: Option<Box<dyn FrameOverlay>>,
    pub encoder: Box<dyn FrameEncoder>,
    pub video: Box<dyn VideoSink>,
    pub store: Box<dyn CaptureStore>,
    pub events: Box<dyn EventSink>,
}

/// Runs the kiosk: reads frames, evaluates them while armed, emits events,
/// and streams display frames.
///
/// At most one capture is produced per armed period; the session disarms in
/// the same tick that emits `capture_success`.
pub struct SessionController {
    source: FrameSource,
    detector: Box<dyn FaceDetector>,
    overlay: Option<Box<dyn FrameOverlay>>,
    encoder: Box<dyn FrameEncoder>,
    video: Box<dyn VideoSink>,
    store: Box<dyn CaptureStore>,
    handle: SessionHandle,
    frame_interval: Duration,
    streamed: u64,
}

impl SessionController {
    pub fn new(parts: SessionParts, machine: CaptureStateMachine, frame_interval: Duration) -> Self {
        Self {
            source: parts.source,
            detector: parts.detector,
            overlay: parts.overlay,
            encoder: parts.encoder,
            video: parts.video,
            store: parts.store,
            handle: SessionHandle::new(machine, parts.events),
            frame_interval,
            streamed: 0,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Connects to the camera and streams until `cancelled` is set or the
    /// video consumer goes away. The camera is released on every exit path.
    pub fn run(&mut self, cancelled: Arc<AtomicBool>) -> Result<(), SessionError> {
        if let Err(e) = self.source.open() {
            log::error!("Camera connection failed: {e}");
            if let Err(write_err) = self.video.write_error(CAMERA_ERROR_BODY) {
                log::warn!("Could not deliver camera error frame: {write_err}");
            }
            self.source.close();
            return Err(SessionError::CameraUnavailable(e));
        }
        log::info!("Session ready, waiting for start_capture");

        while !cancelled.load(Ordering::Relaxed) {
            let started = Instant::now();
            match self.tick() {
                Ok(TickOutcome::NoFrame) => {
                    std::thread::sleep(Duration::from_millis(NO_FRAME_POLL_MS));
                }
                Ok(_) => {
                    if let Some(rest) = self.frame_interval.checked_sub(started.elapsed()) {
                        std::thread::sleep(rest);
                    }
                }
                Err(e) => {
                    log::info!("Video consumer disconnected: {e}");
                    break;
                }
            }
        }

        self.source.close();
        log::info!("Session stopped after {} frames", self.streamed);
        Ok(())
    }

    /// One iteration of the streaming loop. Only a failed video write is an
    /// error; it means the consumer has gone.
    pub fn tick(&mut self) -> std::io::Result<TickOutcome> {
        let Some(frame) = self.source.read_frame() else {
            return Ok(TickOutcome::NoFrame);
        };

        let display = {
            let mut session = lock(&self.handle.session);
            if session.armed {
                let detections = match self.detector.detect(&frame) {
                    Ok(d) => d,
                    Err(e) => {
                        log::warn!("Face detection failed, treating as no face: {e}");
                        Vec::new()
                    }
                };
                let decision = session.machine.evaluate(&frame, &detections);
                let mut color = StatusColor::for_state(Some(decision.state));

                // The crop is persisted before any status goes out, so
                // "capture complete" is only ever followed by its URL.
                match decision.crop.as_ref().map(|crop| self.store.save(crop)) {
                    None => emit(
                        &self.handle.events,
                        SessionEvent::face_status(decision.status(), decision.message()),
                    ),
                    Some(Ok(url)) => {
                        log::info!("Captured face: {url}");
                        emit(
                            &self.handle.events,
                            SessionEvent::face_status(decision.status(), decision.message()),
                        );
                        emit(&self.handle.events, SessionEvent::CaptureSuccess { url });
                        session.armed = false;
                        session.machine.reset();
                        emit(&self.handle.events, SessionEvent::idle());
                    }
                    Some(Err(e)) => {
                        log::warn!("Failed to store capture, staying armed: {e}");
                        emit(&self.handle.events, SessionEvent::capture_failed());
                        color = StatusColor::Red;
                    }
                }

                decorate(self.overlay.as_deref(), &frame, color)
            } else {
                session.machine.reset();
                frame
            }
        };

        let jpeg = match self.encoder.encode(&display) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Skipping frame {}: {e}", display.index());
                return Ok(TickOutcome::Skipped);
            }
        };
        self.video.write_frame(&jpeg)?;

        self.streamed += 1;
        if self.streamed % LOG_EVERY_FRAMES == 0 {
            log::debug!("Streamed {} frames", self.streamed);
        }
        Ok(TickOutcome::Streamed)
    }
}

/// Overlay-decorated copy of `frame`, or the frame itself if rendering fails.
fn decorate(overlay: Option<&dyn FrameOverlay>, frame: &Frame, color: StatusColor) -> Frame {
    let Some(overlay) = overlay else {
        return frame.clone();
    };
    match overlay.render(frame, color) {
        Ok(decorated) => decorated,
        Err(e) => {
            log::warn!("Overlay failed, streaming undecorated frame: {e}");
            frame.clone()
        }
    }
}

fn emit(events: &Mutex<Box<dyn EventSink>>, event: SessionEvent) {
    lock(events).emit(event);
}

/// Locks `m`, recovering the guard if a previous holder panicked.
fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

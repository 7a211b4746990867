use std::time::{Duration, Instant};

use crate::camera::domain::frame_processing::post_process;
use crate::camera::domain::stream_connection::{
    ConnectError, ConnectionState, StreamConnection, StreamConnector,
};
use crate::shared::config::CameraConfig;
use crate::shared::frame::Frame;

/// Self-healing source of post-processed camera frames.
///
/// Owns at most one live [`StreamConnection`]. Transport failures never
/// escape [`FrameSource::read_frame`]; they show up as `None` and trigger
/// bounded reconnection. Once the attempt cap is exhausted the source keeps
/// trying on the slower `exhausted_retry_interval` cadence.
pub struct FrameSource {
    connector: Box<dyn StreamConnector>,
    config: CameraConfig,
    connection: Option<Box<dyn StreamConnection>>,
    state: ConnectionState,
    reconnect_attempts: u32,
    last_attempt_at: Option<Instant>,
    last_frame_at: Instant,
    exhaustion_reported: bool,
    frame_index: usize,
}

impl FrameSource {
    pub fn new(connector: Box<dyn StreamConnector>, config: CameraConfig) -> Self {
        Self {
            connector,
            config,
            connection: None,
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            last_attempt_at: None,
            last_frame_at: Instant::now(),
            exhaustion_reported: false,
            frame_index: 0,
        }
    }

    /// Performs the initial connection, including the warm-up grace period.
    pub fn open(&mut self) -> Result<(), ConnectError> {
        self.release();
        self.connect_once()
    }

    /// Next frame, or `None` when nothing is available this tick.
    pub fn read_frame(&mut self) -> Option<Frame> {
        if !self.is_healthy() {
            self.release();
            self.try_reconnect();
            if !self.is_healthy() {
                return None;
            }
        }

        let raw = self.connection.as_mut().and_then(|c| c.read_raw());
        match raw {
            Some(raw) => {
                // Undecodable frames do not count as liveness.
                let frame = post_process(
                    raw,
                    self.config.width,
                    self.config.height,
                    self.frame_index,
                )?;
                self.last_frame_at = Instant::now();
                self.state = ConnectionState::Open;
                self.frame_index += 1;
                Some(frame)
            }
            None => {
                if !self.is_healthy() {
                    log::warn!("Camera stream closed, reconnecting");
                    self.release();
                    self.try_reconnect();
                } else if self.last_frame_at.elapsed() > self.config.stale_timeout() {
                    log::warn!(
                        "No frame for {:?}, treating stream as stale",
                        self.last_frame_at.elapsed()
                    );
                    self.state = ConnectionState::Stale;
                    self.release();
                    self.try_reconnect();
                }
                None
            }
        }
    }

    /// False when no handle exists or the transport reports closed.
    pub fn is_healthy(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_open())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Releases the underlying handle. Idempotent.
    pub fn close(&mut self) {
        if self.connection.is_some() {
            log::info!("Closing camera stream");
        }
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.close();
        }
        if self.state != ConnectionState::Stale {
            self.state = ConnectionState::Disconnected;
        }
    }

    fn try_reconnect(&mut self) {
        let cap = self.config.max_reconnect_attempts;
        let exhausted = self.reconnect_attempts >= cap;

        let wait = if exhausted {
            if !self.exhaustion_reported {
                log::warn!(
                    "Camera reconnection failed {cap} times, retrying every {:?}",
                    self.config.exhausted_retry_interval()
                );
                self.exhaustion_reported = true;
            }
            self.config.exhausted_retry_interval()
        } else {
            self.config.reconnect_delay()
        };

        if self
            .last_attempt_at
            .is_some_and(|at| at.elapsed() < wait)
        {
            return;
        }

        if !exhausted {
            self.reconnect_attempts += 1;
            log::info!(
                "Reconnecting to camera (attempt {}/{cap})",
                self.reconnect_attempts
            );
        }

        if let Err(e) = self.connect_once() {
            log::warn!("Camera reconnect failed: {e}");
        }
    }

    fn connect_once(&mut self) -> Result<(), ConnectError> {
        self.state = ConnectionState::Connecting;
        self.last_attempt_at = Some(Instant::now());

        let result = self.connector.connect(&self.config.uri).and_then(|conn| {
            sleep_nonzero(self.config.warmup());
            if conn.is_open() {
                Ok(conn)
            } else {
                Err(ConnectError::ClosedDuringWarmup {
                    uri: self.config.uri.clone(),
                })
            }
        });

        match result {
            Ok(conn) => {
                log::info!("Connected to camera {}", self.config.uri);
                self.connection = Some(conn);
                self.state = ConnectionState::Open;
                self.reconnect_attempts = 0;
                self.exhaustion_reported = false;
                self.last_frame_at = Instant::now();
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn sleep_nonzero(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelOrder;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted connection: pops frames until empty, then reports `None`.
    struct FakeConnection {
        frames: VecDeque<Frame>,
        open: bool,
        live: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl StreamConnection for FakeConnection {
        fn read_raw(&mut self) -> Option<Frame> {
            if !self.open {
                return None;
            }
            self.frames.pop_front()
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn close(&mut self) {
            if self.open {
                self.open = false;
                self.live.fetch_sub(1, Ordering::SeqCst);
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Each `connect` consumes one scripted outcome; `true` succeeds.
    /// Once the script runs out, every attempt fails.
    #[derive(Clone)]
    struct FakeConnector {
        outcomes: Arc<Mutex<VecDeque<bool>>>,
        frames_per_connection: usize,
        attempts: Arc<AtomicUsize>,
        live: Arc<AtomicUsize>,
        max_live: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl FakeConnector {
        fn new(outcomes: &[bool], frames_per_connection: usize) -> Self {
            Self {
                outcomes: Arc::new(Mutex::new(outcomes.iter().copied().collect())),
                frames_per_connection,
                attempts: Arc::new(AtomicUsize::new(0)),
                live: Arc::new(AtomicUsize::new(0)),
                max_live: Arc::new(AtomicUsize::new(0)),
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl StreamConnector for FakeConnector {
        fn connect(&mut self, uri: &str) -> Result<Box<dyn StreamConnection>, ConnectError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let ok = self.outcomes.lock().unwrap().pop_front().unwrap_or(false);
            if !ok {
                return Err(ConnectError::Open {
                    uri: uri.to_string(),
                    reason: "refused".into(),
                });
            }
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(live, Ordering::SeqCst);
            let frames = (0..self.frames_per_connection)
                .map(|i| Frame::new(vec![i as u8; 4 * 2 * 3], 4, 2, 3, PixelOrder::Rgb, i))
                .collect();
            Ok(Box::new(FakeConnection {
                frames,
                open: true,
                live: self.live.clone(),
                closes: self.closes.clone(),
            }))
        }
    }

    /// Always connects; every frame is 4-channel.
    struct FourChannelConnector;

    impl StreamConnector for FourChannelConnector {
        fn connect(&mut self, _uri: &str) -> Result<Box<dyn StreamConnection>, ConnectError> {
            let frames = (0..3)
                .map(|i| Frame::new(vec![200; 4 * 2 * 4], 4, 2, 4, PixelOrder::Bgr, i))
                .collect();
            Ok(Box::new(FakeConnection {
                frames,
                open: true,
                live: Arc::new(AtomicUsize::new(1)),
                closes: Arc::new(AtomicUsize::new(0)),
            }))
        }
    }

    fn fast_config(max_attempts: u32, stale_ms: u64) -> CameraConfig {
        CameraConfig {
            uri: "rtsp://camera/stream".into(),
            width: 4,
            height: 2,
            warmup_ms: 0,
            max_reconnect_attempts: max_attempts,
            reconnect_delay_ms: 0,
            exhausted_retry_interval_ms: 0,
            stale_timeout_ms: stale_ms,
            ..CameraConfig::default()
        }
    }

    #[test]
    fn test_four_channel_frames_read_as_no_frame() {
        let mut source = FrameSource::new(Box::new(FourChannelConnector), fast_config(3, 5000));
        source.open().unwrap();
        for _ in 0..3 {
            assert!(source.read_frame().is_none());
        }
        assert!(source.is_healthy());
        assert_eq!(source.reconnect_attempts(), 0);
    }

    #[test]
    fn test_open_and_read_post_processed_frame() {
        let connector = FakeConnector::new(&[true], 1);
        let mut source = FrameSource::new(Box::new(connector), fast_config(3, 5000));
        source.open().unwrap();
        assert!(source.is_healthy());
        assert_eq!(source.state(), ConnectionState::Open);

        let frame = source.read_frame().unwrap();
        assert_eq!(frame.order(), PixelOrder::Bgr);
        assert_eq!((frame.width(), frame.height()), (4, 2));
    }

    #[test]
    fn test_open_failure_is_reported() {
        let connector = FakeConnector::new(&[false], 0);
        let mut source = FrameSource::new(Box::new(connector), fast_config(3, 5000));
        assert!(source.open().is_err());
        assert!(!source.is_healthy());
        assert_eq!(source.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_reconnect_attempts_never_exceed_cap() {
        let connector = FakeConnector::new(&[], 0);
        let attempts = connector.attempts.clone();
        let mut source = FrameSource::new(Box::new(connector), fast_config(3, 5000));

        for _ in 0..10 {
            assert!(source.read_frame().is_none());
            assert!(source.reconnect_attempts() <= 3);
        }
        assert_eq!(source.reconnect_attempts(), 3);
        // Exhausted sources keep trying on the slow cadence (zero in this config).
        assert_eq!(attempts.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_successful_reconnect_resets_counter() {
        let connector = FakeConnector::new(&[false, false, true], 1);
        let mut source = FrameSource::new(Box::new(connector), fast_config(5, 5000));

        assert!(source.read_frame().is_none());
        assert!(source.read_frame().is_none());
        assert_eq!(source.reconnect_attempts(), 2);

        assert!(source.read_frame().is_some());
        assert_eq!(source.reconnect_attempts(), 0);
    }

    #[test]
    fn test_exhausted_source_recovers_later() {
        let connector = FakeConnector::new(&[false, false, false, true], 1);
        let mut source = FrameSource::new(Box::new(connector), fast_config(2, 5000));

        assert!(source.read_frame().is_none());
        assert!(source.read_frame().is_none());
        assert_eq!(source.reconnect_attempts(), 2);
        assert!(source.read_frame().is_none()); // exhausted, slow retry fails
        assert_eq!(source.reconnect_attempts(), 2);
        assert!(source.read_frame().is_some()); // slow retry succeeds
        assert_eq!(source.reconnect_attempts(), 0);
    }

    #[test]
    fn test_reconnect_delay_paces_attempts() {
        let connector = FakeConnector::new(&[], 0);
        let attempts = connector.attempts.clone();
        let config = CameraConfig {
            reconnect_delay_ms: 60_000,
            ..fast_config(5, 5000)
        };
        let mut source = FrameSource::new(Box::new(connector), config);

        for _ in 0..5 {
            source.read_frame();
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_stream_is_replaced_without_overlap() {
        let connector = FakeConnector::new(&[true, true], 0);
        let attempts = connector.attempts.clone();
        let max_live = connector.max_live.clone();
        let closes = connector.closes.clone();
        let mut source = FrameSource::new(Box::new(connector), fast_config(3, 0));
        source.open().unwrap();

        std::thread::sleep(Duration::from_millis(2));
        assert!(source.read_frame().is_none());

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(max_live.load(Ordering::SeqCst), 1);
        assert!(source.is_healthy());
    }

    #[test]
    fn test_fresh_stream_without_frame_is_not_stale() {
        let connector = FakeConnector::new(&[true], 0);
        let attempts = connector.attempts.clone();
        let mut source = FrameSource::new(Box::new(connector), fast_config(3, 60_000));
        source.open().unwrap();

        assert!(source.read_frame().is_none());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(source.is_healthy());
    }

    #[test]
    fn test_close_is_idempotent_and_releases_once() {
        let connector = FakeConnector::new(&[true], 0);
        let closes = connector.closes.clone();
        let mut source = FrameSource::new(Box::new(connector), fast_config(3, 5000));
        source.open().unwrap();

        source.close();
        source.close();
        drop(source);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_connection() {
        let connector = FakeConnector::new(&[true], 0);
        let live = connector.live.clone();
        {
            let mut source = FrameSource::new(Box::new(connector), fast_config(3, 5000));
            source.open().unwrap();
            assert_eq!(live.load(Ordering::SeqCst), 1);
        }
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}

use std::io::Write;

use crossbeam_channel::Sender;

use crate::session::domain::session_event::{EventSink, SessionEvent};

/// Forwards events to a channel; a dropped receiver silently discards them.
pub struct ChannelEventSink {
    tx: Sender<SessionEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: Sender<SessionEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&mut self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Event receiver gone, dropping event");
        }
    }
}

/// Writes one JSON object per line, e.g.
/// `{"event":"face_status","status":"ready","message":"hold still"}`.
pub struct JsonLinesEventSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesEventSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> EventSink for JsonLinesEventSink<W> {
    fn emit(&mut self, event: SessionEvent) {
        let result = serde_json::to_writer(&mut self.out, &event)
            .map_err(std::io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"))
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            log::warn!("Failed to write {} event: {e}", event.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut sink = ChannelEventSink::new(tx);
        sink.emit(SessionEvent::face_status("ready", "hold still"));
        sink.emit(SessionEvent::idle());
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                SessionEvent::face_status("ready", "hold still"),
                SessionEvent::idle()
            ]
        );
    }

    #[test]
    fn test_channel_sink_tolerates_dropped_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let mut sink = ChannelEventSink::new(tx);
        sink.emit(SessionEvent::idle());
    }

    #[test]
    fn test_json_lines_output() {
        let mut sink = JsonLinesEventSink::new(Vec::new());
        sink.emit(SessionEvent::CaptureSuccess {
            url: "http://x/face_1.jpg".into(),
        });
        sink.emit(SessionEvent::idle());
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"event":"capture_success","url":"http://x/face_1.jpg"}"#);
        assert!(lines[1].contains(r#""status":"idle""#));
    }
}

pub mod event_sinks;
pub mod file_capture_store;
pub mod jpeg_encoder;
pub mod mjpeg_writer;

pub mod ffmpeg_connector;

pub mod pipeline_logger;
pub mod stream_video_use_case;
pub mod telemetry_pipeline;

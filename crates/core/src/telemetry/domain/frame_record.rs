use crate::preprocessing::histogram_stats::HistogramStats;
use crate::shared::face_box::FaceBox;
use crate::shared::motion_transform::MotionTransform;

/// Per-frame telemetry sent from producer to collector.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    pub session_id: String,
    pub frame_index: u64,
    /// JPEG of the downscaled colour frame.
    pub image_payload: Vec<u8>,
    pub faces: Vec<FaceBox>,
    pub face_count: u32,
    pub motion: MotionTransform,
    pub stretch_stats: HistogramStats,
    pub face_runtime_ms: f64,
    pub transform_runtime_ms: f64,
}

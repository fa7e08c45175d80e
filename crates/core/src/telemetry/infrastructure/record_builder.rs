use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::preprocessing::histogram_stats::HistogramStats;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;
use crate::shared::motion_transform::MotionTransform;
use crate::shared::timing::round_ms;
use crate::telemetry::domain::frame_record::FrameRecord;

/// Runtimes measured upstream, embedded as-is (rounded for reporting).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageTimings {
    pub stretch: HistogramStats,
    pub face_runtime_ms: f64,
    pub transform_runtime_ms: f64,
}

/// Compresses the downscaled frame and assembles the [`FrameRecord`].
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    session_id: String,
    jpeg_quality: u8,
}

impl RecordBuilder {
    pub fn new(session_id: impl Into<String>, jpeg_quality: u8) -> Self {
        Self {
            session_id: session_id.into(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn build(
        &self,
        frame: &Frame,
        faces: Vec<FaceBox>,
        motion: MotionTransform,
        timings: StageTimings,
    ) -> Result<FrameRecord, image::ImageError> {
        let image_payload = self.encode_jpeg(frame)?;
        Ok(FrameRecord {
            session_id: self.session_id.clone(),
            frame_index: frame.index() as u64,
            image_payload,
            face_count: faces.len() as u32,
            faces,
            motion,
            stretch_stats: timings.stretch,
            face_runtime_ms: round_ms(timings.face_runtime_ms),
            transform_runtime_ms: round_ms(timings.transform_runtime_ms),
        })
    }

    pub fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.jpeg_quality).encode(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(out)
    }
}

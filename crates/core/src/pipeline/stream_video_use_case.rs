use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::telemetry_pipeline::{PipelineError, PipelineState, TelemetryPipeline};
use crate::shared::timing::elapsed_ms;
use crate::shared::video_metadata::VideoMetadata;
use crate::telemetry::infrastructure::record_codec;
use crate::transport::domain::datagram_transport::{DatagramSender, SendOutcome};
use crate::video::domain::video_reader::VideoReader;

/// Session id for a video: its file name without directory or extension.
pub fn session_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string())
}

/// Counters for one streaming run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames: usize,
    pub sent: usize,
    pub dropped: usize,
}

/// Producer loop: decode, step, encode, send, pace.
///
/// Frames are paced to the source frame rate; a frame that takes longer
/// than its budget is not compensated for.
pub struct StreamVideoUseCase {
    reader: Box<dyn VideoReader>,
    pipeline: TelemetryPipeline,
    sender: Box<dyn DatagramSender>,
    logger: Box<dyn PipelineLogger>,
    pace: bool,
    fallback_fps: f64,
    cancelled: Arc<AtomicBool>,
}

impl StreamVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        pipeline: TelemetryPipeline,
        sender: Box<dyn DatagramSender>,
        logger: Box<dyn PipelineLogger>,
        pace: bool,
        fallback_fps: f64,
    ) -> Self {
        Self {
            reader,
            pipeline,
            sender,
            logger,
            pace,
            fallback_fps,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the loop before the next frame once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn run(&mut self, path: &Path) -> Result<StreamSummary, PipelineError> {
        let metadata = self
            .reader
            .open(path)
            .map_err(|e| PipelineError::Open(format!("{}: {e}", path.display())))?;

        self.logger.info(&format!(
            "Streaming {} ({}x{}, {:.2} fps, session '{}')",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            self.pipeline.session_id()
        ));

        let result = self.stream(&metadata);
        self.reader.close();
        self.logger.summary();

        if let Ok(summary) = &result {
            log::info!(
                "Producer finished: {} frames, {} sent, {} dropped",
                summary.frames,
                summary.sent,
                summary.dropped
            );
        }
        result
    }

    fn stream(&mut self, metadata: &VideoMetadata) -> Result<StreamSummary, PipelineError> {
        let frame_interval = Duration::from_secs_f64(1.0 / metadata.pacing_fps(self.fallback_fps));
        let mut state = PipelineState::default();
        let mut summary = StreamSummary::default();

        let mut frames = self.reader.frames();
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                log::info!("Producer cancelled after {} frames", summary.frames);
                break;
            }
            // the frame budget includes decoding
            let started = Instant::now();
            let Some(frame) = frames.next() else {
                break;
            };
            let frame = frame.map_err(|e| PipelineError::Decode(e.to_string()))?;

            let (next, record) = self.pipeline.step(state, &frame)?;
            state = next;

            self.logger.timing("stretch", record.stretch_stats.runtime_ms);
            self.logger.timing("motion", record.transform_runtime_ms);
            if record.face_runtime_ms > 0.0 {
                self.logger.timing("detect", record.face_runtime_ms);
            }
            self.logger.metric("faces", record.face_count as f64);

            let encode_start = Instant::now();
            let datagram = record_codec::encode(&record)?;
            self.logger.timing("encode", elapsed_ms(encode_start));
            self.logger.metric("payload_bytes", datagram.len() as f64);

            let send_start = Instant::now();
            match self.sender.send(&datagram) {
                SendOutcome::Sent { .. } => summary.sent += 1,
                SendOutcome::Dropped { size, reason } => {
                    log::debug!("frame {}: {size}-byte record dropped ({reason:?})", frame.index());
                    summary.dropped += 1;
                }
            }
            self.logger.timing("send", elapsed_ms(send_start));

            summary.frames += 1;
            self.logger.progress(summary.frames, metadata.total_frames);

            if self.pace {
                let elapsed = started.elapsed();
                if elapsed < frame_interval {
                    std::thread::sleep(frame_interval - elapsed);
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection_scheduler::DetectionScheduler;
    use crate::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
    use crate::motion::domain::motion_estimator::{MotionEstimate, MotionEstimator};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::preprocessing::preprocessor::Preprocessor;
    use crate::shared::face_box::FaceBox;
    use crate::shared::frame::Frame;
    use crate::shared::gray_frame::GrayFrame;
    use crate::shared::motion_transform::MotionTransform;
    use crate::telemetry::infrastructure::record_builder::RecordBuilder;
    use crate::transport::domain::datagram_transport::DropReason;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct StubReader {
        frames: Vec<Frame>,
        fps: f64,
        closed: Arc<Mutex<bool>>,
        fail_open: bool,
        decode_delay: Duration,
    }

    impl StubReader {
        fn new(count: usize, fps: f64) -> Self {
            Self {
                frames: (0..count).map(|i| Frame::filled(32, 32, [80, 80, 80], i)).collect(),
                fps,
                closed: Arc::new(Mutex::new(false)),
                fail_open: false,
                decode_delay: Duration::ZERO,
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("no such file".into());
            }
            Ok(VideoMetadata {
                width: 32,
                height: 32,
                fps: self.fps,
                total_frames: self.frames.len(),
                codec: "stub".to_string(),
                source_path: None,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let delay = self.decode_delay;
            Box::new(self.frames.drain(..).map(move |frame| {
                std::thread::sleep(delay);
                Ok(frame)
            }))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct StillMotion;

    impl MotionEstimator for StillMotion {
        fn estimate(&mut self, _prev: &GrayFrame, _curr: &GrayFrame) -> MotionEstimate {
            MotionEstimate::fitted(MotionTransform::identity(), 4, 4, 0.1)
        }
    }

    /// Accepts every other datagram.
    struct FlakySender {
        sizes: Arc<Mutex<Vec<usize>>>,
        count: usize,
    }

    impl DatagramSender for FlakySender {
        fn send(&mut self, datagram: &[u8]) -> SendOutcome {
            self.count += 1;
            if self.count % 2 == 0 {
                return SendOutcome::Dropped {
                    size: datagram.len(),
                    reason: DropReason::WouldBlock,
                };
            }
            self.sizes.lock().unwrap().push(datagram.len());
            SendOutcome::Sent {
                bytes: datagram.len(),
            }
        }
    }

    fn pipeline() -> TelemetryPipeline {
        TelemetryPipeline::new(
            Preprocessor::new(2).unwrap(),
            DetectionScheduler::new(10).unwrap(),
            Box::new(ReplayFaceDetector::new(HashMap::from([(
                0,
                vec![FaceBox::new(1, 1, 4, 4)],
            )]))),
            Box::new(StillMotion),
            RecordBuilder::new("clip", 60),
        )
    }

    fn use_case(reader: StubReader, pace: bool) -> (StreamVideoUseCase, Arc<Mutex<Vec<usize>>>) {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sender = FlakySender {
            sizes: sizes.clone(),
            count: 0,
        };
        let use_case = StreamVideoUseCase::new(
            Box::new(reader),
            pipeline(),
            Box::new(sender),
            Box::new(NullPipelineLogger),
            pace,
            25.0,
        );
        (use_case, sizes)
    }

    #[test]
    fn test_session_id_is_file_stem() {
        assert_eq!(session_id_for(Path::new("input/walk_01.mp4")), "walk_01");
        assert_eq!(session_id_for(Path::new("clip")), "clip");
        assert_eq!(session_id_for(&PathBuf::from("/a/b.c.avi")), "b.c");
    }

    #[test]
    fn test_streams_every_frame_and_counts_drops() {
        let reader = StubReader::new(5, 30.0);
        let closed = reader.closed.clone();
        let (mut use_case, sizes) = use_case(reader, false);

        let summary = use_case.run(Path::new("clip.mp4")).unwrap();

        assert_eq!(
            summary,
            StreamSummary {
                frames: 5,
                sent: 3,
                dropped: 2
            }
        );
        assert_eq!(sizes.lock().unwrap().len(), 3);
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_open_failure_is_an_error() {
        let mut reader = StubReader::new(1, 30.0);
        reader.fail_open = true;
        let (mut use_case, _) = use_case(reader, false);

        assert!(matches!(
            use_case.run(Path::new("missing.mp4")),
            Err(PipelineError::Open(_))
        ));
    }

    #[test]
    fn test_pacing_follows_frame_rate() {
        // 4 frames at 50 fps: at least three full 20ms intervals
        let (mut use_case, _) = use_case(StubReader::new(4, 50.0), true);

        let start = Instant::now();
        use_case.run(Path::new("clip.mp4")).unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_pacing_budget_includes_decode_time() {
        // 6 frames at 20 fps with 30ms decode each: ~300ms, not 6 * (30 + 50)
        let mut reader = StubReader::new(6, 20.0);
        reader.decode_delay = Duration::from_millis(30);
        let (mut use_case, _) = use_case(reader, true);

        let start = Instant::now();
        use_case.run(Path::new("clip.mp4")).unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(250), "took {elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");
    }

    #[test]
    fn test_cancel_flag_stops_before_first_frame() {
        let (mut use_case, sizes) = use_case(StubReader::new(3, 30.0), false);
        use_case.cancel_flag().store(true, Ordering::Relaxed);

        let summary = use_case.run(Path::new("clip.mp4")).unwrap();

        assert_eq!(summary.frames, 0);
        assert!(sizes.lock().unwrap().is_empty());
    }
}

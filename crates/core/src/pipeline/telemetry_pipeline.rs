use std::time::Instant;

use thiserror::Error;

use crate::detection::domain::box_propagator::BoxPropagator;
use crate::detection::domain::detection_scheduler::DetectionScheduler;
use crate::detection::domain::face_detector::FaceDetector;
use crate::motion::domain::motion_estimator::{FallbackReason, MotionEstimate, MotionEstimator};
use crate::motion::infrastructure::klt_motion_estimator::{KltConfig, KltMotionEstimator};
use crate::preprocessing::preprocessor::Preprocessor;
use crate::shared::config::ProducerConfig;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;
use crate::shared::gray_frame::GrayFrame;
use crate::shared::motion_transform::MotionTransform;
use crate::shared::timing::elapsed_ms;
use crate::telemetry::domain::frame_record::FrameRecord;
use crate::telemetry::infrastructure::record_builder::{RecordBuilder, StageTimings};
use crate::telemetry::infrastructure::record_codec::CodecError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    Config(&'static str),
    #[error("cannot open video: {0}")]
    Open(String),
    #[error("failed to decode frame: {0}")]
    Decode(String),
    #[error("face detection failed on frame {frame}: {message}")]
    Detection { frame: usize, message: String },
    #[error("failed to compress frame {frame}: {source}")]
    Compress {
        frame: usize,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Everything carried from one frame to the next.
#[derive(Clone, Debug, Default)]
pub struct PipelineState {
    /// Stretched working frame of the previous step.
    pub prev_gray: Option<GrayFrame>,
    /// Last non-empty detection; propagation always starts from here.
    pub tracked: Vec<FaceBox>,
}

/// Boxes to report for this frame and the tracked set for the next one.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub to_send: Vec<FaceBox>,
    pub tracked: Vec<FaceBox>,
}

/// Merges this frame's detection (if it ran) with the tracked set.
///
/// A non-empty detection replaces everything. Otherwise the tracked boxes
/// are propagated through `transform` for sending but kept unchanged, so
/// an empty detection never clears them.
pub fn reconcile(
    detected: Option<Vec<FaceBox>>,
    tracked: Vec<FaceBox>,
    transform: &MotionTransform,
    propagator: &BoxPropagator,
) -> Reconciled {
    match detected {
        Some(faces) if !faces.is_empty() => Reconciled {
            to_send: faces.clone(),
            tracked: faces,
        },
        _ => Reconciled {
            to_send: propagator.propagate_all(&tracked, transform),
            tracked,
        },
    }
}

/// The producer's per-frame detect/track step.
///
/// State lives outside the pipeline and is threaded through [`step`]; the
/// pipeline itself only owns its stage components.
///
/// [`step`]: TelemetryPipeline::step
pub struct TelemetryPipeline {
    preprocessor: Preprocessor,
    scheduler: DetectionScheduler,
    detector: Box<dyn FaceDetector>,
    estimator: Box<dyn MotionEstimator>,
    propagator: BoxPropagator,
    builder: RecordBuilder,
}

impl TelemetryPipeline {
    pub fn new(
        preprocessor: Preprocessor,
        scheduler: DetectionScheduler,
        detector: Box<dyn FaceDetector>,
        estimator: Box<dyn MotionEstimator>,
        builder: RecordBuilder,
    ) -> Self {
        Self {
            preprocessor,
            scheduler,
            detector,
            estimator,
            propagator: BoxPropagator,
            builder,
        }
    }

    /// Wires the standard stages (KLT motion) from a producer config.
    pub fn from_config(
        cfg: &ProducerConfig,
        session_id: &str,
        detector: Box<dyn FaceDetector>,
    ) -> Result<Self, PipelineError> {
        Ok(Self::new(
            Preprocessor::new(cfg.downscale_factor).map_err(PipelineError::Config)?,
            DetectionScheduler::new(cfg.detect_interval).map_err(PipelineError::Config)?,
            detector,
            Box::new(KltMotionEstimator::new(KltConfig::from_producer_config(cfg))),
            RecordBuilder::new(session_id, cfg.jpeg_quality),
        ))
    }

    pub fn session_id(&self) -> &str {
        self.builder.session_id()
    }

    /// Processes one raw frame, returning the next state and its record.
    pub fn step(
        &mut self,
        state: PipelineState,
        frame: &Frame,
    ) -> Result<(PipelineState, FrameRecord), PipelineError> {
        let index = frame.index();
        let pre = self.preprocessor.preprocess(frame);

        let motion = match &state.prev_gray {
            Some(prev) => self.estimator.estimate(prev, &pre.gray),
            None => MotionEstimate::fallback(FallbackReason::NoPreviousFrame, 0.0),
        };

        let (detected, face_runtime_ms) =
            if self.scheduler.should_detect(index, !state.tracked.is_empty()) {
                let start = Instant::now();
                let faces = self.detector.detect(&pre.color).map_err(|e| {
                    PipelineError::Detection {
                        frame: index,
                        message: e.to_string(),
                    }
                })?;
                (Some(faces), elapsed_ms(start))
            } else {
                (None, 0.0)
            };

        log::debug!(
            "frame {index}: detection {}, motion {:?}",
            match &detected {
                Some(faces) => format!("found {}", faces.len()),
                None => "skipped".to_string(),
            },
            motion.outcome
        );

        let Reconciled { to_send, tracked } =
            reconcile(detected, state.tracked, &motion.transform, &self.propagator);

        let record = self
            .builder
            .build(
                &pre.color,
                to_send,
                motion.transform,
                StageTimings {
                    stretch: pre.stretch,
                    face_runtime_ms,
                    transform_runtime_ms: motion.runtime_ms,
                },
            )
            .map_err(|source| PipelineError::Compress {
                frame: index,
                source,
            })?;

        let next = PipelineState {
            prev_gray: Some(pre.gray),
            tracked,
        };
        Ok((next, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Always reports the same transform.
    struct FixedMotion(MotionTransform);

    impl MotionEstimator for FixedMotion {
        fn estimate(&mut self, _prev: &GrayFrame, _curr: &GrayFrame) -> MotionEstimate {
            MotionEstimate::fitted(self.0, 10, 10, 0.5)
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
            Err("model exploded".into())
        }
    }

    fn pipeline(
        script: HashMap<usize, Vec<FaceBox>>,
        motion: MotionTransform,
    ) -> (TelemetryPipeline, Arc<Mutex<Vec<usize>>>) {
        let detector = ReplayFaceDetector::new(script);
        let calls = detector.call_log();
        let pipeline = TelemetryPipeline::new(
            Preprocessor::new(4).unwrap(),
            DetectionScheduler::new(10).unwrap(),
            Box::new(detector),
            Box::new(FixedMotion(motion)),
            RecordBuilder::new("test", 60),
        );
        (pipeline, calls)
    }

    fn frame(index: usize) -> Frame {
        Frame::filled(64, 48, [90, 120, 150], index)
    }

    fn face() -> FaceBox {
        FaceBox::new(4, 4, 6, 6)
    }

    #[test]
    fn test_reconcile_prefers_fresh_detection() {
        let tracked = vec![FaceBox::new(0, 0, 1, 1)];
        let fresh = vec![face()];
        let out = reconcile(
            Some(fresh.clone()),
            tracked,
            &MotionTransform::translation(3.0, 3.0),
            &BoxPropagator,
        );
        assert_eq!(out.to_send, fresh);
        assert_eq!(out.tracked, fresh);
    }

    #[test]
    fn test_reconcile_empty_detection_keeps_stale_boxes() {
        let tracked = vec![face()];
        let out = reconcile(
            Some(Vec::new()),
            tracked.clone(),
            &MotionTransform::translation(2.0, 0.0),
            &BoxPropagator,
        );
        assert_eq!(out.to_send, vec![FaceBox::new(6, 4, 6, 6)]);
        assert_eq!(out.tracked, tracked);
    }

    #[test]
    fn test_reconcile_skipped_detection_propagates_without_updating() {
        let tracked = vec![face()];
        let out = reconcile(
            None,
            tracked.clone(),
            &MotionTransform::translation(0.0, 5.0),
            &BoxPropagator,
        );
        assert_eq!(out.to_send, vec![FaceBox::new(4, 9, 6, 6)]);
        assert_eq!(out.tracked, tracked);
    }

    #[test]
    fn test_first_frame_has_identity_motion_and_runs_detection() {
        let (mut pipeline, calls) = pipeline(
            HashMap::from([(0, vec![face()])]),
            MotionTransform::translation(1.0, 1.0),
        );

        let (state, record) = pipeline.step(PipelineState::default(), &frame(0)).unwrap();

        assert!(record.motion.is_identity());
        assert_eq!(record.transform_runtime_ms, 0.0);
        assert_eq!(record.faces, vec![face()]);
        assert_eq!(record.face_count, 1);
        assert_eq!(*calls.lock().unwrap(), vec![0]);
        assert_eq!(state.tracked, vec![face()]);
        let gray = state.prev_gray.unwrap();
        assert_eq!((gray.width(), gray.height()), (16, 12));
    }

    #[test]
    fn test_skipped_frames_propagate_from_last_detection() {
        let (mut pipeline, calls) = pipeline(
            HashMap::from([(0, vec![face()])]),
            MotionTransform::translation(1.0, 0.0),
        );

        let (state, _) = pipeline.step(PipelineState::default(), &frame(0)).unwrap();
        let (state, first) = pipeline.step(state, &frame(1)).unwrap();
        let (state, second) = pipeline.step(state, &frame(2)).unwrap();

        // Each skipped frame warps the stored detection, not the previous output.
        assert_eq!(first.faces, vec![FaceBox::new(5, 4, 6, 6)]);
        assert_eq!(second.faces, vec![FaceBox::new(5, 4, 6, 6)]);
        assert_eq!(first.face_runtime_ms, 0.0);
        assert_eq!(state.tracked, vec![face()]);
        assert_eq!(*calls.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_detection_retried_every_frame_while_nothing_tracked() {
        let (mut pipeline, calls) = pipeline(HashMap::new(), MotionTransform::identity());

        let mut state = PipelineState::default();
        for i in 0..4 {
            let (next, record) = pipeline.step(state, &frame(i)).unwrap();
            assert!(record.faces.is_empty());
            state = next;
        }

        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_record_carries_session_and_index() {
        let (mut pipeline, _) = pipeline(HashMap::new(), MotionTransform::identity());
        let (_, record) = pipeline.step(PipelineState::default(), &frame(7)).unwrap();
        assert_eq!(record.session_id, "test");
        assert_eq!(record.frame_index, 7);
        assert!(!record.image_payload.is_empty());
        assert!(record.stretch_stats.input_min == record.stretch_stats.input_max);
    }

    #[test]
    fn test_detector_failure_is_an_error() {
        let mut pipeline = TelemetryPipeline::new(
            Preprocessor::new(4).unwrap(),
            DetectionScheduler::new(10).unwrap(),
            Box::new(FailingDetector),
            Box::new(FixedMotion(MotionTransform::identity())),
            RecordBuilder::new("test", 60),
        );

        let err = pipeline
            .step(PipelineState::default(), &frame(3))
            .unwrap_err();

        assert!(matches!(err, PipelineError::Detection { frame: 3, .. }));
    }

    #[test]
    fn test_from_config_rejects_zero_interval() {
        let cfg = ProducerConfig {
            detect_interval: 0,
            ..ProducerConfig::default()
        };
        let result = TelemetryPipeline::from_config(
            &cfg,
            "clip",
            Box::new(ReplayFaceDetector::new(HashMap::new())),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}

use std::time::Instant;

use crate::motion::domain::motion_estimator::{FallbackReason, MotionEstimate, MotionEstimator};
use crate::motion::infrastructure::corner_detector::{good_features_to_track, CornerParams};
use crate::motion::infrastructure::lucas_kanade::{track_points, LkParams};
use crate::motion::infrastructure::pyramid::Pyramid;
use crate::motion::infrastructure::ransac_affine::{fit_ransac, Correspondence, RansacParams};
use crate::shared::config::ProducerConfig;
use crate::shared::gray_frame::GrayFrame;
use crate::shared::motion_transform::MotionTransform;
use crate::shared::timing::{elapsed_ms, round_ms};

/// Fewer tracked pairs than this and no fit is attempted.
pub const MIN_CORRESPONDENCES: usize = 4;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct KltConfig {
    pub corners: CornerParams,
    pub flow: LkParams,
    pub ransac: RansacParams,
}

impl KltConfig {
    pub fn from_producer_config(cfg: &ProducerConfig) -> Self {
        Self {
            corners: CornerParams {
                max_corners: cfg.max_corners,
                quality_level: cfg.corner_quality,
                min_distance: cfg.corner_min_distance,
                block_size: cfg.corner_block_size,
            },
            flow: LkParams {
                window: cfg.lk_window,
                levels: cfg.lk_levels,
                max_iterations: cfg.lk_max_iterations,
                epsilon: cfg.lk_epsilon,
            },
            ransac: RansacParams {
                model: cfg.motion_model,
                threshold: cfg.ransac_threshold,
                max_iterations: cfg.ransac_max_iterations,
                confidence: cfg.ransac_confidence,
                ..RansacParams::default()
            },
        }
    }
}

/// Sparse-feature motion estimator: Shi-Tomasi corners in the previous
/// frame, pyramidal Lucas-Kanade into the current one, RANSAC affine fit.
pub struct KltMotionEstimator {
    config: KltConfig,
}

impl KltMotionEstimator {
    pub fn new(config: KltConfig) -> Self {
        Self { config }
    }

    /// Fits a transform to already-tracked pairs.
    pub fn fit(&self, pairs: &[Correspondence], start: Instant) -> MotionEstimate {
        if pairs.len() < MIN_CORRESPONDENCES {
            return MotionEstimate::fallback(
                FallbackReason::InsufficientCorrespondences { found: pairs.len() },
                round_ms(elapsed_ms(start)),
            );
        }
        match fit_ransac(pairs, &self.config.ransac) {
            Some(fit) => MotionEstimate::fitted(
                MotionTransform::from_affine(fit.affine),
                fit.inliers,
                pairs.len(),
                round_ms(elapsed_ms(start)),
            ),
            None => MotionEstimate::fallback(FallbackReason::FitFailed, round_ms(elapsed_ms(start))),
        }
    }
}

impl MotionEstimator for KltMotionEstimator {
    fn estimate(&mut self, prev: &GrayFrame, curr: &GrayFrame) -> MotionEstimate {
        let start = Instant::now();
        if prev.width() != curr.width() || prev.height() != curr.height() {
            return MotionEstimate::fallback(
                FallbackReason::ShapeMismatch,
                round_ms(elapsed_ms(start)),
            );
        }

        let corners = good_features_to_track(prev, &self.config.corners);
        if corners.is_empty() {
            return MotionEstimate::fallback(FallbackReason::NoFeatures, round_ms(elapsed_ms(start)));
        }

        let prev_pyramid = Pyramid::build(prev, self.config.flow.levels);
        let curr_pyramid = Pyramid::build(curr, self.config.flow.levels);
        let tracked = track_points(&prev_pyramid, &curr_pyramid, &corners, &self.config.flow);

        let pairs: Vec<Correspondence> = corners
            .iter()
            .zip(tracked)
            .filter_map(|(&from, to)| to.map(|to| (from, to)))
            .collect();
        log::debug!(
            "KLT: {} corners, {} tracked",
            corners.len(),
            pairs.len()
        );

        self.fit(&pairs, start)
    }
}

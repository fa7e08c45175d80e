use crate::shared::gray_frame::GrayFrame;
use crate::shared::motion_transform::MotionTransform;

/// Why an estimate fell back to the identity transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    /// First frame of a stream; there is nothing to compare against.
    NoPreviousFrame,
    /// Previous and current frames have different dimensions.
    ShapeMismatch,
    NoFeatures,
    InsufficientCorrespondences { found: usize },
    FitFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionOutcome {
    Fitted {
        inliers: usize,
        correspondences: usize,
    },
    Fallback(FallbackReason),
}

/// Frame-to-frame motion together with how it was obtained.
///
/// `transform` is always a valid affine matrix; fallbacks carry identity.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionEstimate {
    pub transform: MotionTransform,
    pub runtime_ms: f64,
    pub outcome: MotionOutcome,
}

impl MotionEstimate {
    pub fn fitted(
        transform: MotionTransform,
        inliers: usize,
        correspondences: usize,
        runtime_ms: f64,
    ) -> Self {
        Self {
            transform,
            runtime_ms,
            outcome: MotionOutcome::Fitted {
                inliers,
                correspondences,
            },
        }
    }

    pub fn fallback(reason: FallbackReason, runtime_ms: f64) -> Self {
        Self {
            transform: MotionTransform::identity(),
            runtime_ms,
            outcome: MotionOutcome::Fallback(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, MotionOutcome::Fallback(_))
    }
}

/// Domain interface for estimating the planar motion between two
/// consecutive working frames.
///
/// Estimation never fails: anything that prevents a fit yields the
/// identity transform with a [`FallbackReason`].
pub trait MotionEstimator: Send {
    fn estimate(&mut self, prev: &GrayFrame, curr: &GrayFrame) -> MotionEstimate;
}

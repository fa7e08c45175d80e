//! Robust affine fitting with RANSAC and a least-squares refit.

use nalgebra::{Matrix2x3, Matrix3, Matrix4, Vector3, Vector4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Degrees of freedom of the fitted motion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionModel {
    /// Translation, rotation, scale and shear.
    #[default]
    Affine,
    /// Translation, rotation and uniform scale.
    Similarity,
}

impl MotionModel {
    pub fn min_samples(self) -> usize {
        match self {
            MotionModel::Affine => 3,
            MotionModel::Similarity => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RansacParams {
    pub model: MotionModel,
    /// Maximum reprojection error of an inlier, in pixels.
    pub threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            model: MotionModel::Affine,
            threshold: 3.0,
            max_iterations: 2000,
            confidence: 0.99,
            seed: 0x5eed,
        }
    }
}

/// A point pair: position in the previous frame and in the current one.
pub type Correspondence = ((f64, f64), (f64, f64));

#[derive(Clone, Debug, PartialEq)]
pub struct AffineFit {
    pub affine: Matrix2x3<f64>,
    pub inliers: usize,
}

/// Fits `params.model` to `pairs`, rejecting outliers.
///
/// Returns `None` when there are too few pairs, every sample is degenerate,
/// or the consensus set is too small to refit.
pub fn fit_ransac(pairs: &[Correspondence], params: &RansacParams) -> Option<AffineFit> {
    let k = params.model.min_samples();
    let n = pairs.len();
    if n < k {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Vec<bool> = Vec::new();
    let mut best_count = 0usize;
    let mut limit = params.max_iterations.max(1);
    let mut iteration = 0usize;
    let mut sample: Vec<Correspondence> = Vec::with_capacity(k);

    while iteration < limit {
        iteration += 1;

        sample.clear();
        sample.extend(
            rand::seq::index::sample(&mut rng, n, k)
                .into_iter()
                .map(|i| pairs[i]),
        );
        let Some(candidate) = fit_least_squares(&sample, params.model) else {
            continue;
        };

        let mask = inlier_mask(&candidate, pairs, params.threshold);
        let count = mask.iter().filter(|&&m| m).count();
        if count > best_count {
            best_count = count;
            best = mask;
            limit = limit.min(required_iterations(
                best_count as f64 / n as f64,
                k,
                params.confidence,
                iteration,
            ));
        }
    }

    if best_count < k {
        return None;
    }

    let inliers: Vec<Correspondence> = pairs
        .iter()
        .zip(&best)
        .filter(|(_, keep)| **keep)
        .map(|(p, _)| *p)
        .collect();
    let affine = fit_least_squares(&inliers, params.model)?;
    let inliers = inlier_mask(&affine, pairs, params.threshold)
        .iter()
        .filter(|&&m| m)
        .count();
    Some(AffineFit { affine, inliers })
}

/// Least-squares fit of `model` over all `pairs`, `None` if degenerate.
pub fn fit_least_squares(pairs: &[Correspondence], model: MotionModel) -> Option<Matrix2x3<f64>> {
    if pairs.len() < model.min_samples() || is_degenerate(pairs, model) {
        return None;
    }
    match model {
        MotionModel::Affine => fit_affine(pairs),
        MotionModel::Similarity => fit_similarity(pairs),
    }
}

/// Solves `x' = a x + b y + c` and `y' = d x + e y + f` via the shared
/// normal matrix.
fn fit_affine(pairs: &[Correspondence]) -> Option<Matrix2x3<f64>> {
    let mut normal = Matrix3::<f64>::zeros();
    let mut rhs_x = Vector3::<f64>::zeros();
    let mut rhs_y = Vector3::<f64>::zeros();
    for &((x, y), (u, v)) in pairs {
        let row = Vector3::new(x, y, 1.0);
        normal += row * row.transpose();
        rhs_x += row * u;
        rhs_y += row * v;
    }
    let lu = normal.lu();
    let px = lu.solve(&rhs_x)?;
    let py = lu.solve(&rhs_y)?;
    let affine = Matrix2x3::new(px[0], px[1], px[2], py[0], py[1], py[2]);
    affine.iter().all(|v| v.is_finite()).then_some(affine)
}

/// Solves `x' = a x - b y + tx` and `y' = b x + a y + ty`.
fn fit_similarity(pairs: &[Correspondence]) -> Option<Matrix2x3<f64>> {
    let mut normal = Matrix4::<f64>::zeros();
    let mut rhs = Vector4::<f64>::zeros();
    for &((x, y), (u, v)) in pairs {
        let row_u = Vector4::new(x, -y, 1.0, 0.0);
        let row_v = Vector4::new(y, x, 0.0, 1.0);
        normal += row_u * row_u.transpose() + row_v * row_v.transpose();
        rhs += row_u * u + row_v * v;
    }
    let p = normal.lu().solve(&rhs)?;
    let (a, b, tx, ty) = (p[0], p[1], p[2], p[3]);
    let affine = Matrix2x3::new(a, -b, tx, b, a, ty);
    affine.iter().all(|v| v.is_finite()).then_some(affine)
}

/// Source points that cannot pin down `model`: coincident points for a
/// similarity, collinear ones for a full affine.
fn is_degenerate(pairs: &[Correspondence], model: MotionModel) -> bool {
    let n = pairs.len() as f64;
    let (mx, my) = pairs
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &((x, y), _)| (sx + x, sy + y));
    let (mx, my) = (mx / n, my / n);
    let (mut cxx, mut cxy, mut cyy) = (0.0f64, 0.0f64, 0.0f64);
    for &((x, y), _) in pairs {
        let (dx, dy) = (x - mx, y - my);
        cxx += dx * dx;
        cxy += dx * dy;
        cyy += dy * dy;
    }
    let trace = cxx + cyy;
    if trace <= 1e-9 {
        return true;
    }
    match model {
        MotionModel::Similarity => false,
        MotionModel::Affine => {
            let min_eigen = trace / 2.0 - (((cxx - cyy) / 2.0).powi(2) + cxy * cxy).sqrt();
            min_eigen <= 1e-6 * trace
        }
    }
}

fn inlier_mask(affine: &Matrix2x3<f64>, pairs: &[Correspondence], threshold: f64) -> Vec<bool> {
    let threshold_sq = threshold * threshold;
    pairs
        .iter()
        .map(|&((x, y), (u, v))| {
            let px = affine[(0, 0)] * x + affine[(0, 1)] * y + affine[(0, 2)];
            let py = affine[(1, 0)] * x + affine[(1, 1)] * y + affine[(1, 2)];
            (px - u).powi(2) + (py - v).powi(2) <= threshold_sq
        })
        .collect()
}

/// Iterations needed to draw one all-inlier sample with `confidence`,
/// given the current inlier ratio. Never less than `done`.
fn required_iterations(inlier_ratio: f64, k: usize, confidence: f64, done: usize) -> usize {
    let all_inliers = inlier_ratio.powi(k as i32);
    if all_inliers >= 1.0 - f64::EPSILON {
        return done;
    }
    if all_inliers <= f64::EPSILON {
        return usize::MAX;
    }
    let needed = (1.0 - confidence).ln() / (1.0 - all_inliers).ln();
    if !needed.is_finite() {
        return usize::MAX;
    }
    (needed.ceil() as usize).max(done)
}

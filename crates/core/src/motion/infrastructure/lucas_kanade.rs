//! Pyramidal Lucas-Kanade sparse optical flow.

use crate::motion::infrastructure::pyramid::{sample, Pyramid, PyramidLevel};

/// Spatial gradient matrices whose normalized minimum eigenvalue falls
/// below this are considered untrackable.
const MIN_EIGEN_THRESHOLD: f64 = 1e-4;

#[derive(Clone, Debug, PartialEq)]
pub struct LkParams {
    /// Side length of the square tracking window, in pixels.
    pub window: usize,
    pub levels: usize,
    pub max_iterations: usize,
    pub epsilon: f64,
}

impl Default for LkParams {
    fn default() -> Self {
        Self {
            window: 21,
            levels: 3,
            max_iterations: 30,
            epsilon: 0.01,
        }
    }
}

/// Tracks each point of `prev` into `next`.
///
/// The result has one entry per input point; `None` marks a lost point.
pub fn track_points(
    prev: &Pyramid,
    next: &Pyramid,
    points: &[(f64, f64)],
    params: &LkParams,
) -> Vec<Option<(f64, f64)>> {
    points
        .iter()
        .map(|&p| track_point(prev, next, p, params))
        .collect()
}

fn track_point(
    prev: &Pyramid,
    next: &Pyramid,
    point: (f64, f64),
    params: &LkParams,
) -> Option<(f64, f64)> {
    let levels = prev.len().min(next.len());
    if levels == 0 {
        return None;
    }
    let half = (params.window.max(3) / 2) as f64;
    let mut guess = (0.0, 0.0);

    for level in (0..levels).rev() {
        let scale = (1u32 << level) as f64;
        let origin = (point.0 / scale, point.1 / scale);

        match refine(prev.level(level), next.level(level), origin, guess, half, params) {
            Some(flow) => guess = flow,
            None if level == 0 => return None,
            None => {}
        }
        if level > 0 {
            guess = (guess.0 * 2.0, guess.1 * 2.0);
        }
    }

    let tracked = (point.0 + guess.0, point.1 + guess.1);
    let base = next.level(0);
    let inside = tracked.0 >= 0.0
        && tracked.1 >= 0.0
        && tracked.0 <= (base.width() - 1) as f64
        && tracked.1 <= (base.height() - 1) as f64;
    inside.then_some(tracked)
}

/// Iteratively solves for the flow at one level, starting from `guess`.
///
/// Returns the total flow at this level or `None` when the point cannot be
/// tracked here.
fn refine(
    prev: &PyramidLevel,
    next: &PyramidLevel,
    origin: (f64, f64),
    guess: (f64, f64),
    half: f64,
    params: &LkParams,
) -> Option<(f64, f64)> {
    if window_outside(prev, origin, half) {
        return None;
    }

    let steps = (2.0 * half) as usize + 1;
    let offsets: Vec<f64> = (0..steps).map(|i| i as f64 - half).collect();

    let mut template = Vec::with_capacity(steps * steps);
    let (mut gxx, mut gxy, mut gyy) = (0.0f64, 0.0f64, 0.0f64);
    for &dy in &offsets {
        for &dx in &offsets {
            let (x, y) = (origin.0 + dx, origin.1 + dy);
            let ix = sample(&prev.grad_x, x, y) as f64;
            let iy = sample(&prev.grad_y, x, y) as f64;
            let i = sample(&prev.image, x, y) as f64;
            gxx += ix * ix;
            gxy += ix * iy;
            gyy += iy * iy;
            template.push((i, ix, iy));
        }
    }

    let area = (steps * steps) as f64;
    let min_eigen = ((gxx + gyy) - ((gxx - gyy).powi(2) + 4.0 * gxy * gxy).sqrt()) / (2.0 * area);
    let det = gxx * gyy - gxy * gxy;
    if min_eigen < MIN_EIGEN_THRESHOLD || det.abs() < f64::EPSILON {
        return None;
    }

    let mut flow = guess;
    for _ in 0..params.max_iterations {
        let moved = (origin.0 + flow.0, origin.1 + flow.1);
        if window_outside(next, moved, half) {
            return None;
        }

        let (mut bx, mut by) = (0.0f64, 0.0f64);
        let mut k = 0;
        for &dy in &offsets {
            for &dx in &offsets {
                let (i, ix, iy) = template[k];
                let j = sample(&next.image, moved.0 + dx, moved.1 + dy) as f64;
                let diff = i - j;
                bx += diff * ix;
                by += diff * iy;
                k += 1;
            }
        }

        let step_x = (gyy * bx - gxy * by) / det;
        let step_y = (gxx * by - gxy * bx) / det;
        flow = (flow.0 + step_x, flow.1 + step_y);

        if step_x * step_x + step_y * step_y < params.epsilon * params.epsilon {
            break;
        }
    }
    Some(flow)
}

/// True once the window around `center` lies completely outside the level.
fn window_outside(level: &PyramidLevel, center: (f64, f64), half: f64) -> bool {
    center.0 < -half
        || center.1 < -half
        || center.0 > (level.width() - 1) as f64 + half
        || center.1 > (level.height() - 1) as f64 + half
        || !center.0.is_finite()
        || !center.1.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::gray_frame::GrayFrame;

    fn texture(dx: f64, dy: f64) -> GrayFrame {
        GrayFrame::from_fn(160, 120, |x, y| {
            let (x, y) = (x as f64 - dx, y as f64 - dy);
            let v = 128.0 + 50.0 * (0.21 * x + 0.07 * y).sin() + 50.0 * (0.17 * y - 0.05 * x).cos();
            v.clamp(0.0, 255.0) as u8
        })
    }

    #[test]
    fn test_tracks_small_translation() {
        let prev = Pyramid::build(&texture(0.0, 0.0), 3);
        let next = Pyramid::build(&texture(2.0, 1.0), 3);
        let points = [(60.0, 50.0), (80.0, 70.0), (100.0, 40.0)];

        let tracked = track_points(&prev, &next, &points, &LkParams::default());

        for (p, t) in points.iter().zip(&tracked) {
            let (tx, ty) = t.expect("point should be tracked");
            assert!((tx - p.0 - 2.0).abs() < 0.3, "x: {p:?} -> {tx}");
            assert!((ty - p.1 - 1.0).abs() < 0.3, "y: {p:?} -> {ty}");
        }
    }

    #[test]
    fn test_identical_frames_have_zero_flow() {
        let pyramid = Pyramid::build(&texture(0.0, 0.0), 3);
        let tracked = track_points(&pyramid, &pyramid, &[(70.0, 60.0)], &LkParams::default());
        let (x, y) = tracked[0].expect("point should be tracked");
        assert!((x - 70.0).abs() < 1e-3);
        assert!((y - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_flat_region_is_lost() {
        let pyramid = Pyramid::build(&GrayFrame::filled(64, 64, 100), 3);
        let tracked = track_points(&pyramid, &pyramid, &[(32.0, 32.0)], &LkParams::default());
        assert_eq!(tracked, vec![None]);
    }

    #[test]
    fn test_one_entry_per_point() {
        let pyramid = Pyramid::build(&texture(0.0, 0.0), 2);
        let points = vec![(10.0, 10.0); 5];
        assert_eq!(track_points(&pyramid, &pyramid, &points, &LkParams::default()).len(), 5);
    }
}

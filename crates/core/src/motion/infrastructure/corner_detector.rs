//! Shi-Tomasi corner selection.
//!
//! Scores every pixel by the smaller eigenvalue of its structure tensor
//! accumulated over a square block, then keeps the strongest local maxima
//! that are spread at least `min_distance` apart.

use ndarray::Array2;

use crate::shared::gray_frame::GrayFrame;

#[derive(Clone, Debug, PartialEq)]
pub struct CornerParams {
    pub max_corners: usize,
    /// Fraction of the strongest response a corner must reach.
    pub quality_level: f64,
    pub min_distance: f64,
    pub block_size: usize,
}

impl Default for CornerParams {
    fn default() -> Self {
        Self {
            max_corners: 100,
            quality_level: 0.3,
            min_distance: 7.0,
            block_size: 7,
        }
    }
}

/// Returns up to `max_corners` corner positions `(x, y)`, strongest first.
pub fn good_features_to_track(image: &GrayFrame, params: &CornerParams) -> Vec<(f64, f64)> {
    let (h, w) = (image.height(), image.width());
    if w < 3 || h < 3 || params.max_corners == 0 {
        return Vec::new();
    }

    let response = min_eigen_response(image, params.block_size.max(1));
    let max_response = response.iter().copied().fold(0.0f64, f64::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = params.quality_level * max_response;

    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let r = response[[y, x]];
            if r > 0.0 && r >= threshold && is_local_max(&response, x, y) {
                candidates.push((r, x, y));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then((a.2, a.1).cmp(&(b.2, b.1))));

    let min_dist_sq = params.min_distance * params.min_distance;
    let mut corners: Vec<(f64, f64)> = Vec::new();
    for (_, x, y) in candidates {
        let (fx, fy) = (x as f64, y as f64);
        let too_close = corners.iter().any(|&(cx, cy)| {
            let (dx, dy) = (cx - fx, cy - fy);
            dx * dx + dy * dy < min_dist_sq
        });
        if !too_close {
            corners.push((fx, fy));
            if corners.len() == params.max_corners {
                break;
            }
        }
    }
    corners
}

/// Minimum eigenvalue of the block-summed structure tensor at each pixel.
fn min_eigen_response(image: &GrayFrame, block_size: usize) -> Array2<f64> {
    let (h, w) = (image.height(), image.width());
    let (gx, gy) = sobel(image);

    let xx = integral(&(&gx * &gx));
    let xy = integral(&(&gx * &gy));
    let yy = integral(&(&gy * &gy));

    let before = (block_size - 1) / 2;
    let after = block_size / 2;

    Array2::from_shape_fn((h, w), |(y, x)| {
        let x0 = x.saturating_sub(before);
        let y0 = y.saturating_sub(before);
        let x1 = (x + after).min(w - 1) + 1;
        let y1 = (y + after).min(h - 1) + 1;

        let a = box_sum(&xx, x0, y0, x1, y1);
        let b = box_sum(&xy, x0, y0, x1, y1);
        let c = box_sum(&yy, x0, y0, x1, y1);

        let half_trace = (a + c) / 2.0;
        let disc = (((a - c) / 2.0).powi(2) + b * b).sqrt();
        (half_trace - disc).max(0.0)
    })
}

/// 3×3 Sobel derivatives with replicated borders.
fn sobel(image: &GrayFrame) -> (Array2<f64>, Array2<f64>) {
    let (h, w) = (image.height(), image.width());
    let px = |x: isize, y: isize| -> f64 {
        let cx = x.clamp(0, w as isize - 1) as usize;
        let cy = y.clamp(0, h as isize - 1) as usize;
        image.get(cx, cy) as f64
    };

    let gx = Array2::from_shape_fn((h, w), |(y, x)| {
        let (x, y) = (x as isize, y as isize);
        (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
            - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1))
    });
    let gy = Array2::from_shape_fn((h, w), |(y, x)| {
        let (x, y) = (x as isize, y as isize);
        (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
            - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1))
    });
    (gx, gy)
}

/// Summed-area table with a zero first row and column.
fn integral(values: &Array2<f64>) -> Array2<f64> {
    let (h, w) = values.dim();
    let mut table = Array2::<f64>::zeros((h + 1, w + 1));
    for y in 0..h {
        let mut row = 0.0;
        for x in 0..w {
            row += values[[y, x]];
            table[[y + 1, x + 1]] = table[[y, x + 1]] + row;
        }
    }
    table
}

/// Sum over `[x0, x1) × [y0, y1)`.
fn box_sum(table: &Array2<f64>, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
    table[[y1, x1]] - table[[y0, x1]] - table[[y1, x0]] + table[[y0, x0]]
}

fn is_local_max(response: &Array2<f64>, x: usize, y: usize) -> bool {
    let (h, w) = response.dim();
    let r = response[[y, x]];
    for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
            if response[[ny, nx]] > r {
                return false;
            }
        }
    }
    true
}

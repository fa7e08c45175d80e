use ndarray::Array2;

use crate::shared::gray_frame::GrayFrame;

/// Levels smaller than this in either dimension are not built.
const MIN_LEVEL_SIZE: usize = 8;

/// One pyramid level with its spatial derivatives.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    pub image: Array2<f32>,
    pub grad_x: Array2<f32>,
    pub grad_y: Array2<f32>,
}

impl PyramidLevel {
    fn new(image: Array2<f32>) -> Self {
        let (grad_x, grad_y) = scharr(&image);
        Self {
            image,
            grad_x,
            grad_y,
        }
    }

    pub fn width(&self) -> usize {
        self.image.ncols()
    }

    pub fn height(&self) -> usize {
        self.image.nrows()
    }
}

/// Gaussian image pyramid; level 0 is full resolution and each further
/// level halves both dimensions.
#[derive(Clone, Debug)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    /// Builds at most `max_levels` levels (at least one).
    pub fn build(image: &GrayFrame, max_levels: usize) -> Self {
        let base = image.pixels().mapv(|p| p as f32);
        let mut levels = vec![PyramidLevel::new(base)];
        while levels.len() < max_levels.max(1) {
            let Some(last) = levels.last() else { break };
            if last.width() / 2 < MIN_LEVEL_SIZE || last.height() / 2 < MIN_LEVEL_SIZE {
                break;
            }
            let next = pyr_down(&last.image);
            levels.push(PyramidLevel::new(next));
        }
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> &PyramidLevel {
        &self.levels[index]
    }
}

/// Bilinear sample with replicated borders.
pub fn sample(image: &Array2<f32>, x: f64, y: f64) -> f32 {
    let (h, w) = image.dim();
    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let top = image[[y0, x0]] * (1.0 - fx) + image[[y0, x1]] * fx;
    let bottom = image[[y1, x0]] * (1.0 - fx) + image[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

/// 5-tap binomial blur followed by 2× decimation.
fn pyr_down(image: &Array2<f32>) -> Array2<f32> {
    const KERNEL: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
    let (h, w) = image.dim();
    let at = |x: isize, y: isize| -> f32 {
        let cx = x.clamp(0, w as isize - 1) as usize;
        let cy = y.clamp(0, h as isize - 1) as usize;
        image[[cy, cx]]
    };

    let horizontal = Array2::from_shape_fn((h, w), |(y, x)| {
        KERNEL
            .iter()
            .enumerate()
            .map(|(k, weight)| weight * at(x as isize + k as isize - 2, y as isize))
            .sum::<f32>()
            / 16.0
    });
    let at_h = |x: usize, y: isize| -> f32 {
        let cy = y.clamp(0, h as isize - 1) as usize;
        horizontal[[cy, x]]
    };

    Array2::from_shape_fn((h / 2, w / 2), |(y, x)| {
        let (sx, sy) = (x * 2, (y * 2) as isize);
        KERNEL
            .iter()
            .enumerate()
            .map(|(k, weight)| weight * at_h(sx, sy + k as isize - 2))
            .sum::<f32>()
            / 16.0
    })
}

/// Scharr derivatives normalized to intensity units per pixel.
fn scharr(image: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
    let (h, w) = image.dim();
    let at = |x: isize, y: isize| -> f32 {
        let cx = x.clamp(0, w as isize - 1) as usize;
        let cy = y.clamp(0, h as isize - 1) as usize;
        image[[cy, cx]]
    };

    let gx = Array2::from_shape_fn((h, w), |(y, x)| {
        let (x, y) = (x as isize, y as isize);
        (3.0 * (at(x + 1, y - 1) - at(x - 1, y - 1))
            + 10.0 * (at(x + 1, y) - at(x - 1, y))
            + 3.0 * (at(x + 1, y + 1) - at(x - 1, y + 1)))
            / 32.0
    });
    let gy = Array2::from_shape_fn((h, w), |(y, x)| {
        let (x, y) = (x as isize, y as isize);
        (3.0 * (at(x - 1, y + 1) - at(x - 1, y - 1))
            + 10.0 * (at(x, y + 1) - at(x, y - 1))
            + 3.0 * (at(x + 1, y + 1) - at(x + 1, y - 1)))
            / 32.0
    });
    (gx, gy)
}

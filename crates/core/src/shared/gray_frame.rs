use ndarray::Array2;

/// Single-channel 8-bit working frame, indexed `[row, col]`.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayFrame {
    pixels: Array2<u8>,
}

impl GrayFrame {
    pub fn new(pixels: Array2<u8>) -> Self {
        Self { pixels }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        Array2::from_shape_vec((height as usize, width as usize), data)
            .ok()
            .map(Self::new)
    }

    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(Array2::from_elem((height as usize, width as usize), value))
    }

    /// Builds a frame by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(usize, usize) -> u8) -> Self {
        Self::new(Array2::from_shape_fn(
            (height as usize, width as usize),
            |(y, x)| f(x, y),
        ))
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[[y, x]]
    }

    pub fn pixels(&self) -> &Array2<u8> {
        &self.pixels
    }

    /// Pixel extrema, or `None` for an empty frame.
    pub fn min_max(&self) -> Option<(u8, u8)> {
        let mut iter = self.pixels.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }
}

/// Describes one min–max histogram stretch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistogramStats {
    pub input_min: i32,
    pub input_max: i32,
    pub output_min: i32,
    pub output_max: i32,
    pub runtime_ms: f64,
}

impl HistogramStats {
    pub const OUTPUT_MIN: i32 = 0;
    pub const OUTPUT_MAX: i32 = 255;

    pub fn new(input_min: i32, input_max: i32, runtime_ms: f64) -> Self {
        Self {
            input_min,
            input_max,
            output_min: Self::OUTPUT_MIN,
            output_max: Self::OUTPUT_MAX,
            runtime_ms,
        }
    }

    /// True when the input had no usable contrast and passed through as-is.
    pub fn is_passthrough(&self) -> bool {
        self.input_max - self.input_min < 1
    }
}

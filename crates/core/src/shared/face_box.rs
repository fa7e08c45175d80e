use std::fmt;

/// Axis-aligned face box in downscaled-frame pixel coordinates.
///
/// Propagated boxes may extend past the frame edges or carry negative
/// coordinates; nothing here clamps them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl FaceBox {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Corner points in `(x, y)` order: top-left, top-right, bottom-left,
    /// bottom-right.
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (x0, y0) = (self.x as f64, self.y as f64);
        let (x1, y1) = ((self.x + self.w) as f64, (self.y + self.h) as f64);
        [(x0, y0), (x1, y0), (x0, y1), (x1, y1)]
    }
}

impl fmt::Display for FaceBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x, self.y, self.w, self.h)
    }
}

/// Renders boxes as a bracketed list, e.g. `[[1, 2, 3, 4], [5, 6, 7, 8]]`.
pub fn format_boxes(boxes: &[FaceBox]) -> String {
    let inner: Vec<String> = boxes.iter().map(FaceBox::to_string).collect();
    format!("[{}]", inner.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners_order() {
        let b = FaceBox::new(10, 20, 30, 40);
        assert_eq!(
            b.corners(),
            [(10.0, 20.0), (40.0, 20.0), (10.0, 60.0), (40.0, 60.0)]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(FaceBox::new(-3, 4, 5, 6).to_string(), "[-3, 4, 5, 6]");
    }

    #[test]
    fn test_format_boxes() {
        assert_eq!(format_boxes(&[]), "[]");
        assert_eq!(
            format_boxes(&[FaceBox::new(1, 2, 3, 4), FaceBox::new(5, 6, 7, 8)]),
            "[[1, 2, 3, 4], [5, 6, 7, 8]]"
        );
    }
}

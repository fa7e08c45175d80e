use std::fmt;

use nalgebra::{Matrix2x3, Matrix3, Vector3};

/// Planar affine map between consecutive frames as a 3×3 matrix whose last
/// row is always `[0, 0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionTransform {
    matrix: Matrix3<f64>,
}

impl MotionTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Embeds a 2×3 affine fit into the top two rows.
    pub fn from_affine(affine: Matrix2x3<f64>) -> Self {
        let mut matrix = Matrix3::identity();
        matrix.fixed_view_mut::<2, 3>(0, 0).copy_from(&affine);
        Self { matrix }
    }

    /// Pure translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::from_affine(Matrix2x3::new(1.0, 0.0, dx, 0.0, 1.0, dy))
    }

    /// Rebuilds a transform from nine row-major values.
    ///
    /// Returns `None` if any entry is non-finite or the last row is not
    /// `[0, 0, 1]`.
    pub fn from_row_major(values: [f64; 9]) -> Option<Self> {
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        if values[6] != 0.0 || values[7] != 0.0 || values[8] != 1.0 {
            return None;
        }
        Some(Self {
            matrix: Matrix3::from_row_slice(&values),
        })
    }

    pub fn to_row_major(&self) -> [f64; 9] {
        let m = &self.matrix;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix3::identity()
    }

    /// Maps a point through the matrix in homogeneous coordinates.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        (p.x / p.z, p.y / p.z)
    }
}

impl Default for MotionTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for MotionTransform {
    /// Bracketed row-major rendering, e.g. `[[1.0, 0.0, 0.0], ...]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.to_row_major();
        write!(
            f,
            "[[{:?}, {:?}, {:?}], [{:?}, {:?}, {:?}], [{:?}, {:?}, {:?}]]",
            v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_last_row() {
        let t = MotionTransform::identity();
        assert!(t.is_identity());
        assert_eq!(&t.to_row_major()[6..], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_from_affine_embeds_rows() {
        let t = MotionTransform::from_affine(Matrix2x3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0));
        assert_eq!(
            t.to_row_major(),
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_row_major_round_trip() {
        let t = MotionTransform::translation(3.5, -2.0);
        let back = MotionTransform::from_row_major(t.to_row_major()).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn test_from_row_major_rejects_projective_row() {
        let mut v = MotionTransform::identity().to_row_major();
        v[6] = 0.1;
        assert!(MotionTransform::from_row_major(v).is_none());
    }

    #[test]
    fn test_from_row_major_rejects_nan() {
        let mut v = MotionTransform::identity().to_row_major();
        v[2] = f64::NAN;
        assert!(MotionTransform::from_row_major(v).is_none());
    }

    #[test]
    fn test_apply_translation() {
        let (x, y) = MotionTransform::translation(5.0, -3.0).apply(10.0, 10.0);
        assert_relative_eq!(x, 15.0);
        assert_relative_eq!(y, 7.0);
    }

    #[test]
    fn test_display_identity() {
        assert_eq!(
            MotionTransform::identity().to_string(),
            "[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]"
        );
    }
}

use crate::shared::face_box::FaceBox;
use crate::shared::motion_transform::MotionTransform;

/// Carries face boxes from the previous frame into the current one.
///
/// The four corners are pushed through the transform and the axis-aligned
/// bounds of the result become the new box. Coordinates are truncated
/// toward zero and may leave the frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxPropagator;

impl BoxPropagator {
    pub fn propagate(&self, face: &FaceBox, transform: &MotionTransform) -> FaceBox {
        let warped = face.corners().map(|(x, y)| transform.apply(x, y));

        let (min_x, max_x, min_y, max_y) = warped.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(min_x, max_x, min_y, max_y), &(x, y)| {
                (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
            },
        );

        FaceBox::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x) as i32,
            (max_y - min_y) as i32,
        )
    }

    pub fn propagate_all(&self, faces: &[FaceBox], transform: &MotionTransform) -> Vec<FaceBox> {
        faces
            .iter()
            .map(|face| self.propagate(face, transform))
            .collect()
    }
}

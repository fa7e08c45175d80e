pub mod corner_detector;
pub mod klt_motion_estimator;
pub mod lucas_kanade;
pub mod pyramid;
pub mod ransac_affine;

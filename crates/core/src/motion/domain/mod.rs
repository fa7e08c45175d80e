pub mod motion_estimator;

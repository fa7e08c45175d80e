pub mod box_propagator;
pub mod detection_scheduler;
pub mod face_detector;

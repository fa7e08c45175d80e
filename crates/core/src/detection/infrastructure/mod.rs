pub mod execution_provider;
pub mod math;
pub mod model_resolver;
pub mod onnx_yolo_detector;
pub mod replay_face_detector;

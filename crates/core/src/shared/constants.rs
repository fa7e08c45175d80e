pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const DEFAULT_COLLECTOR_ADDR: &str = "127.0.0.1:5555";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const SESSION_LOG_FILE_NAME: &str = "session_data.csv";

pub const DEFAULT_DOWNSCALE_FACTOR: u32 = 4;
pub const DEFAULT_DETECT_INTERVAL: usize = 10;
pub const DEFAULT_JPEG_QUALITY: u8 = 60;

/// Sender-side bound on one serialized record, kept under the 65,507-byte
/// UDP payload limit.
pub const DEFAULT_MAX_DATAGRAM_BYTES: usize = 60_000;
pub const MAX_UDP_PAYLOAD_BYTES: usize = 65_507;
pub const RECEIVE_BUFFER_BYTES: usize = 65_536;

/// Frame rate assumed when the container does not report one.
pub const FALLBACK_FPS: f64 = 25.0;

/// Weight kept by the collector's smoothed fps on each new sample.
pub const DEFAULT_FPS_SMOOTHING: f64 = 0.9;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv"];

pub mod collector;
pub mod detection;
pub mod motion;
pub mod pipeline;
pub mod preprocessing;
pub mod shared;
pub mod telemetry;
pub mod transport;
pub mod video;

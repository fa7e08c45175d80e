pub mod fps_estimator;
pub mod session_demultiplexer;
pub mod session_sink;

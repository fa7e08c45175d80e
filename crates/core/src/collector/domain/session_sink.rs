use std::path::PathBuf;

use thiserror::Error;

use crate::shared::face_box::format_boxes;
use crate::telemetry::domain::frame_record::FrameRecord;
use crate::transport::domain::datagram_transport::TransportError;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("invalid collector configuration: {0}")]
    Config(&'static str),
    #[error("cannot create session output {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write log for session '{session}': {message}")]
    Write { session: String, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Column names of a session log, in row order.
pub const LOG_HEADER: [&str; 7] = [
    "frame",
    "face_count",
    "faces",
    "stretch_runtime_ms",
    "face_runtime_ms",
    "transform_runtime_ms",
    "transform_matrix",
];

/// One persisted line of a session log.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRow {
    pub frame: u64,
    pub face_count: u32,
    pub faces: String,
    pub stretch_runtime_ms: f64,
    pub face_runtime_ms: f64,
    pub transform_runtime_ms: f64,
    pub transform_matrix: String,
}

impl LogRow {
    pub fn from_record(record: &FrameRecord) -> Self {
        Self {
            frame: record.frame_index,
            face_count: record.face_count,
            faces: format_boxes(&record.faces),
            stretch_runtime_ms: record.stretch_stats.runtime_ms,
            face_runtime_ms: record.face_runtime_ms,
            transform_runtime_ms: record.transform_runtime_ms,
            transform_matrix: record.motion.to_string(),
        }
    }

    /// Field values in [`LOG_HEADER`] order.
    pub fn fields(&self) -> [String; 7] {
        [
            self.frame.to_string(),
            self.face_count.to_string(),
            self.faces.clone(),
            format!("{:?}", self.stretch_runtime_ms),
            format!("{:?}", self.face_runtime_ms),
            format!("{:?}", self.transform_runtime_ms),
            self.transform_matrix.clone(),
        ]
    }
}

/// Tabular output for one session.
pub trait SessionSink: Send {
    fn write_header(&mut self, columns: &[&str]) -> Result<(), CollectorError>;

    fn write_row(&mut self, row: &LogRow) -> Result<(), CollectorError>;

    /// Flushes and releases the sink. Called once, on rotation or shutdown.
    fn close(&mut self) -> Result<(), CollectorError>;

    /// Human-readable location, used in log messages.
    fn location(&self) -> String;
}

/// Opens a fresh sink for a session id.
pub trait SinkFactory: Send {
    fn open(&mut self, session_id: &str) -> Result<Box<dyn SessionSink>, CollectorError>;
}

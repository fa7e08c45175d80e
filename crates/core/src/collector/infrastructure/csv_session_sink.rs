use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::collector::domain::session_sink::{CollectorError, LogRow, SessionSink, SinkFactory};

/// Writes one session's rows to a CSV file.
pub struct CsvSessionSink {
    session: String,
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl CsvSessionSink {
    /// Creates (or truncates) `path`, creating parent directories as needed.
    pub fn create(session: &str, path: &Path) -> Result<Self, CollectorError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| CollectorError::CreateOutput {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| CollectorError::CreateOutput {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            session: session.to_string(),
            path: path.to_path_buf(),
            writer: Some(csv::Writer::from_writer(file)),
        })
    }
}

fn write_error(session: &str, message: impl ToString) -> CollectorError {
    CollectorError::Write {
        session: session.to_string(),
        message: message.to_string(),
    }
}

impl SessionSink for CsvSessionSink {
    fn write_header(&mut self, columns: &[&str]) -> Result<(), CollectorError> {
        let session = &self.session;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| write_error(session, "sink already closed"))?;
        writer
            .write_record(columns)
            .map_err(|e| write_error(session, e))
    }

    fn write_row(&mut self, row: &LogRow) -> Result<(), CollectorError> {
        let session = &self.session;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| write_error(session, "sink already closed"))?;
        writer
            .write_record(row.fields())
            .map_err(|e| write_error(session, e))
    }

    fn close(&mut self) -> Result<(), CollectorError> {
        match self.writer.take() {
            Some(mut writer) => writer.flush().map_err(|e| write_error(&self.session, e)),
            None => Ok(()),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Opens `<output_dir>/<session>/<file_name>` sinks.
pub struct CsvSinkFactory {
    output_dir: PathBuf,
    file_name: String,
}

impl CsvSinkFactory {
    pub fn new(output_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.output_dir
            .join(sanitize_session_id(session_id))
            .join(&self.file_name)
    }
}

impl SinkFactory for CsvSinkFactory {
    fn open(&mut self, session_id: &str) -> Result<Box<dyn SessionSink>, CollectorError> {
        let sink = CsvSessionSink::create(session_id, &self.session_path(session_id))?;
        Ok(Box::new(sink))
    }
}

/// Maps a session id onto a single safe path component.
///
/// Separators, control characters and `..` become `_`; an empty result is
/// `unnamed`. Whenever the id had to change, a hash of the raw id is
/// appended so that `a/b` and `a_b` never share a directory.
pub fn sanitize_session_id(session_id: &str) -> String {
    let cleaned: String = session_id
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == ':' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let mut cleaned = cleaned.replace("..", "_");
    if cleaned.is_empty() || cleaned == "." {
        cleaned = "unnamed".to_string();
    }
    if cleaned == session_id {
        cleaned
    } else {
        format!("{cleaned}-{:08x}", fnv1a(session_id.as_bytes()))
    }
}

// 32-bit FNV-1a, stable across builds and platforms.
fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

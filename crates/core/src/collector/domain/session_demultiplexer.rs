use crate::collector::domain::session_sink::{
    CollectorError, LogRow, SessionSink, SinkFactory, LOG_HEADER,
};
use crate::telemetry::domain::frame_record::FrameRecord;

/// What accepting one record did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptOutcome {
    /// A new session sink was opened for this record.
    pub rotated: bool,
    /// Rows written to the active session so far, this one included.
    pub rows_in_session: usize,
}

/// Row count of a session once its sink is closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub rows: usize,
}

struct ActiveSession {
    id: String,
    sink: Box<dyn SessionSink>,
    rows: usize,
}

/// Routes records into one log per session.
///
/// Only one session is open at a time: a record with a different session
/// id closes the current sink and opens a new one. Records from two
/// producers interleaving on the same collector will therefore rotate on
/// every switch and each rotation truncates the log it reopens.
pub struct SessionDemultiplexer {
    factory: Box<dyn SinkFactory>,
    active: Option<ActiveSession>,
    closed: Vec<SessionSummary>,
}

impl SessionDemultiplexer {
    pub fn new(factory: Box<dyn SinkFactory>) -> Self {
        Self {
            factory,
            active: None,
            closed: Vec::new(),
        }
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.id.as_str())
    }

    /// Sessions closed so far, in closing order.
    pub fn closed_sessions(&self) -> &[SessionSummary] {
        &self.closed
    }

    pub fn accept(&mut self, record: &FrameRecord) -> Result<AcceptOutcome, CollectorError> {
        let (session, rotated) = match self.active.take() {
            Some(current) if current.id == record.session_id => (current, false),
            previous => {
                if let Some(previous) = previous {
                    self.close(previous)?;
                }
                (self.open(&record.session_id)?, true)
            }
        };

        let session = self.active.insert(session);
        session.sink.write_row(&LogRow::from_record(record))?;
        session.rows += 1;

        Ok(AcceptOutcome {
            rotated,
            rows_in_session: session.rows,
        })
    }

    /// Flushes and closes the active session, if any.
    pub fn finish(&mut self) -> Result<Option<SessionSummary>, CollectorError> {
        match self.active.take() {
            Some(session) => self.close(session).map(Some),
            None => Ok(None),
        }
    }

    fn open(&mut self, session_id: &str) -> Result<ActiveSession, CollectorError> {
        let mut sink = self.factory.open(session_id)?;
        if let Err(e) = sink.write_header(&LOG_HEADER) {
            if let Err(close_err) = sink.close() {
                log::warn!(
                    "Failed to close session '{session_id}' after header error: {close_err}"
                );
            }
            return Err(e);
        }
        log::info!("Logging session '{session_id}' to {}", sink.location());
        Ok(ActiveSession {
            id: session_id.to_string(),
            sink,
            rows: 0,
        })
    }

    fn close(&mut self, mut session: ActiveSession) -> Result<SessionSummary, CollectorError> {
        session.sink.close()?;
        log::info!(
            "Closed session '{}' ({} rows, {})",
            session.id,
            session.rows,
            session.sink.location()
        );
        let summary = SessionSummary {
            session_id: session.id,
            rows: session.rows,
        };
        self.closed.push(summary.clone());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::histogram_stats::HistogramStats;
    use crate::shared::motion_transform::MotionTransform;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct SinkLog {
        session: String,
        headers: usize,
        rows: Vec<u64>,
        closed: bool,
        fail_header: bool,
    }

    struct RecordingSink(Arc<Mutex<SinkLog>>);

    impl SessionSink for RecordingSink {
        fn write_header(&mut self, columns: &[&str]) -> Result<(), CollectorError> {
            assert_eq!(columns, LOG_HEADER);
            let mut log = self.0.lock().unwrap();
            if log.fail_header {
                return Err(CollectorError::Write {
                    session: log.session.clone(),
                    message: "disk full".to_string(),
                });
            }
            log.headers += 1;
            Ok(())
        }

        fn write_row(&mut self, row: &LogRow) -> Result<(), CollectorError> {
            self.0.lock().unwrap().rows.push(row.frame);
            Ok(())
        }

        fn close(&mut self) -> Result<(), CollectorError> {
            self.0.lock().unwrap().closed = true;
            Ok(())
        }

        fn location(&self) -> String {
            format!("memory:{}", self.0.lock().unwrap().session)
        }
    }

    #[derive(Clone, Default)]
    struct RecordingFactory {
        sinks: Arc<Mutex<Vec<Arc<Mutex<SinkLog>>>>>,
        fail: bool,
        fail_header: bool,
    }

    impl SinkFactory for RecordingFactory {
        fn open(&mut self, session_id: &str) -> Result<Box<dyn SessionSink>, CollectorError> {
            if self.fail {
                return Err(CollectorError::CreateOutput {
                    path: session_id.into(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            let log = Arc::new(Mutex::new(SinkLog {
                session: session_id.to_string(),
                fail_header: self.fail_header,
                ..SinkLog::default()
            }));
            self.sinks.lock().unwrap().push(log.clone());
            Ok(Box::new(RecordingSink(log)))
        }
    }

    fn record(session: &str, frame: u64) -> FrameRecord {
        FrameRecord {
            session_id: session.to_string(),
            frame_index: frame,
            image_payload: Vec::new(),
            faces: Vec::new(),
            face_count: 0,
            motion: MotionTransform::identity(),
            stretch_stats: HistogramStats::new(0, 255, 0.1),
            face_runtime_ms: 0.0,
            transform_runtime_ms: 0.0,
        }
    }

    #[test]
    fn test_sessions_split_on_id_change() {
        let factory = RecordingFactory::default();
        let sinks = factory.sinks.clone();
        let mut demux = SessionDemultiplexer::new(Box::new(factory));

        let ids = ["A", "A", "B", "B", "B"];
        for (i, id) in ids.iter().enumerate() {
            demux.accept(&record(id, i as u64)).unwrap();
        }
        demux.finish().unwrap();

        let sinks = sinks.lock().unwrap();
        assert_eq!(sinks.len(), 2);
        let a = sinks[0].lock().unwrap();
        let b = sinks[1].lock().unwrap();
        assert_eq!((a.session.as_str(), a.headers, a.rows.len()), ("A", 1, 2));
        assert_eq!((b.session.as_str(), b.headers, b.rows.len()), ("B", 1, 3));
        assert!(a.closed && b.closed);
    }

    #[test]
    fn test_accept_reports_rotation() {
        let mut demux = SessionDemultiplexer::new(Box::new(RecordingFactory::default()));

        let first = demux.accept(&record("A", 0)).unwrap();
        let second = demux.accept(&record("A", 1)).unwrap();
        let third = demux.accept(&record("B", 0)).unwrap();

        assert_eq!(
            first,
            AcceptOutcome {
                rotated: true,
                rows_in_session: 1
            }
        );
        assert_eq!(
            second,
            AcceptOutcome {
                rotated: false,
                rows_in_session: 2
            }
        );
        assert!(third.rotated);
        assert_eq!(demux.active_session(), Some("B"));
        assert_eq!(
            demux.closed_sessions(),
            &[SessionSummary {
                session_id: "A".to_string(),
                rows: 2
            }]
        );
    }

    #[test]
    fn test_rows_keep_arrival_order() {
        let factory = RecordingFactory::default();
        let sinks = factory.sinks.clone();
        let mut demux = SessionDemultiplexer::new(Box::new(factory));

        for frame in [3, 1, 2] {
            demux.accept(&record("A", frame)).unwrap();
        }

        assert_eq!(sinks.lock().unwrap()[0].lock().unwrap().rows, vec![3, 1, 2]);
    }

    #[test]
    fn test_finish_without_session_is_noop() {
        let mut demux = SessionDemultiplexer::new(Box::new(RecordingFactory::default()));
        assert_eq!(demux.finish().unwrap(), None);
    }

    #[test]
    fn test_finish_closes_once() {
        let mut demux = SessionDemultiplexer::new(Box::new(RecordingFactory::default()));
        demux.accept(&record("A", 0)).unwrap();

        assert_eq!(
            demux.finish().unwrap(),
            Some(SessionSummary {
                session_id: "A".to_string(),
                rows: 1
            })
        );
        assert_eq!(demux.finish().unwrap(), None);
        assert_eq!(demux.active_session(), None);
    }

    #[test]
    fn test_sink_creation_failure_propagates() {
        let factory = RecordingFactory {
            fail: true,
            ..RecordingFactory::default()
        };
        let mut demux = SessionDemultiplexer::new(Box::new(factory));

        assert!(matches!(
            demux.accept(&record("A", 0)),
            Err(CollectorError::CreateOutput { .. })
        ));
    }

    #[test]
    fn test_header_failure_closes_sink() {
        let factory = RecordingFactory {
            fail_header: true,
            ..RecordingFactory::default()
        };
        let sinks = factory.sinks.clone();
        let mut demux = SessionDemultiplexer::new(Box::new(factory));

        assert!(matches!(
            demux.accept(&record("A", 0)),
            Err(CollectorError::Write { .. })
        ));
        let sinks = sinks.lock().unwrap();
        assert_eq!(sinks.len(), 1);
        let log = sinks[0].lock().unwrap();
        assert!(log.closed);
        assert!(log.rows.is_empty());
        assert_eq!(demux.active_session(), None);
    }
}

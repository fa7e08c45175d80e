use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::collector::domain::fps_estimator::FpsEstimator;
use crate::collector::domain::session_demultiplexer::SessionDemultiplexer;
use crate::collector::domain::session_sink::{CollectorError, SinkFactory};
use crate::shared::config::CollectorConfig;
use crate::telemetry::infrastructure::record_codec;
use crate::transport::domain::datagram_transport::{DatagramReceiver, TransportError};

/// Counters for one collector run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub received: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub sessions: usize,
}

/// Blocking receive loop: decode each datagram and append it to its
/// session log.
///
/// Runs until the cancel flag is set (checked before and after every
/// receive) or the receiver reports that all senders are gone. The active
/// session is flushed and closed on every exit path.
pub struct CollectRecordsUseCase {
    receiver: Box<dyn DatagramReceiver>,
    demux: SessionDemultiplexer,
    fps: FpsEstimator,
    buffer_bytes: usize,
    report_every: usize,
    cancelled: Arc<AtomicBool>,
}

impl CollectRecordsUseCase {
    pub fn new(
        receiver: Box<dyn DatagramReceiver>,
        factory: Box<dyn SinkFactory>,
        cfg: &CollectorConfig,
    ) -> Result<Self, CollectorError> {
        if cfg.max_datagram_bytes == 0 {
            return Err(CollectorError::Config("receive buffer must not be empty"));
        }
        Ok(Self {
            receiver,
            demux: SessionDemultiplexer::new(factory),
            fps: FpsEstimator::new(cfg.fps_smoothing, Instant::now())
                .map_err(CollectorError::Config)?,
            buffer_bytes: cfg.max_datagram_bytes,
            report_every: cfg.report_every.max(1),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that ends the loop once set. The pending receive still has to
    /// return; see [`wake_receiver`].
    ///
    /// [`wake_receiver`]: crate::transport::infrastructure::udp_transport::wake_receiver
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn run(&mut self) -> Result<CollectSummary, CollectorError> {
        let mut summary = CollectSummary::default();
        let result = self.receive_loop(&mut summary);
        let finished = self.demux.finish();
        result?;
        finished?;

        summary.sessions = self.demux.closed_sessions().len();
        log::info!(
            "Collector stopped: {} datagrams, {} records logged, {} rejected, {} sessions",
            summary.received,
            summary.accepted,
            summary.rejected,
            summary.sessions
        );
        Ok(summary)
    }

    fn receive_loop(&mut self, summary: &mut CollectSummary) -> Result<(), CollectorError> {
        let mut buf = vec![0u8; self.buffer_bytes];

        while !self.cancelled.load(Ordering::Relaxed) {
            let len = match self.receiver.recv(&mut buf) {
                Ok(len) => len,
                Err(TransportError::Disconnected) => {
                    log::info!("All producers disconnected");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            summary.received += 1;

            if len == 0 {
                log::debug!("Ignoring empty datagram");
                summary.rejected += 1;
                continue;
            }

            let record = match record_codec::decode(&buf[..len]) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Discarding undecodable {len}-byte datagram: {e}");
                    summary.rejected += 1;
                    continue;
                }
            };

            self.demux.accept(&record)?;
            summary.accepted += 1;

            let fps = self.fps.tick(Instant::now());
            if summary.accepted % self.report_every == 0 {
                log::info!(
                    "Received {} records (session '{}', frame {}, {fps:.2} fps)",
                    summary.accepted,
                    record.session_id,
                    record.frame_index
                );
            }
        }

        Ok(())
    }
}

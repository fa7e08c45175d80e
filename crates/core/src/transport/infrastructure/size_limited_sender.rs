use crate::transport::domain::datagram_transport::{DatagramSender, DropReason, SendOutcome};

/// Decorator that drops datagrams of `max_bytes` or more before they reach
/// the inner sender.
pub struct SizeLimitedSender {
    inner: Box<dyn DatagramSender>,
    max_bytes: usize,
}

impl SizeLimitedSender {
    pub fn new(inner: Box<dyn DatagramSender>, max_bytes: usize) -> Result<Self, &'static str> {
        if max_bytes == 0 {
            return Err("max_bytes must be > 0");
        }
        Ok(Self { inner, max_bytes })
    }
}

impl DatagramSender for SizeLimitedSender {
    fn send(&mut self, datagram: &[u8]) -> SendOutcome {
        if datagram.len() >= self.max_bytes {
            log::warn!(
                "Dropping {}-byte datagram (limit {})",
                datagram.len(),
                self.max_bytes
            );
            return SendOutcome::Dropped {
                size: datagram.len(),
                reason: DropReason::Oversized {
                    limit: self.max_bytes,
                },
            };
        }
        self.inner.send(datagram)
    }
}

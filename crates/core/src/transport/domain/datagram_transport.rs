use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot resolve address {0}")]
    Address(String),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("all senders disconnected")]
    Disconnected,
}

/// Why a datagram never left the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// At or above the configured datagram bound.
    Oversized { limit: usize },
    /// The socket or queue could not take it without blocking.
    WouldBlock,
    /// The send itself failed; already logged.
    SendFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { bytes: usize },
    Dropped { size: usize, reason: DropReason },
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }
}

/// Fire-and-forget datagram sink.
///
/// Never blocks and never fails: any datagram that cannot be handed off is
/// reported as [`SendOutcome::Dropped`] and is gone.
pub trait DatagramSender: Send {
    fn send(&mut self, datagram: &[u8]) -> SendOutcome;
}

/// Blocking datagram source.
pub trait DatagramReceiver: Send {
    /// Waits for the next datagram and copies it into `buf`, returning its
    /// length. Datagrams longer than `buf` are truncated.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

//! In-process datagram transport over a crossbeam channel.

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::transport::domain::datagram_transport::{
    DatagramReceiver, DatagramSender, DropReason, SendOutcome, TransportError,
};

pub struct ChannelSender {
    tx: Sender<Vec<u8>>,
}

pub struct ChannelReceiver {
    rx: Receiver<Vec<u8>>,
}

/// Creates a connected sender/receiver pair. A bounded queue drops
/// datagrams once `capacity` are waiting.
pub fn channel_transport(capacity: Option<usize>) -> (ChannelSender, ChannelReceiver) {
    let (tx, rx) = match capacity {
        Some(n) => crossbeam_channel::bounded(n),
        None => crossbeam_channel::unbounded(),
    };
    (ChannelSender { tx }, ChannelReceiver { rx })
}

impl DatagramSender for ChannelSender {
    fn send(&mut self, datagram: &[u8]) -> SendOutcome {
        match self.tx.try_send(datagram.to_vec()) {
            Ok(()) => SendOutcome::Sent {
                bytes: datagram.len(),
            },
            Err(TrySendError::Full(_)) => SendOutcome::Dropped {
                size: datagram.len(),
                reason: DropReason::WouldBlock,
            },
            Err(TrySendError::Disconnected(_)) => SendOutcome::Dropped {
                size: datagram.len(),
                reason: DropReason::SendFailed,
            },
        }
    }
}

impl DatagramReceiver for ChannelReceiver {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let datagram = self.rx.recv().map_err(|_| TransportError::Disconnected)?;
        let n = datagram.len().min(buf.len());
        buf[..n].copy_from_slice(&datagram[..n]);
        Ok(n)
    }
}

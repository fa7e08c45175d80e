use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::transport::domain::datagram_transport::{
    DatagramReceiver, DatagramSender, DropReason, SendOutcome, TransportError,
};

fn resolve(addr: &str) -> Result<SocketAddr, TransportError> {
    addr.to_socket_addrs()
        .map_err(|_| TransportError::Address(addr.to_string()))?
        .next()
        .ok_or_else(|| TransportError::Address(addr.to_string()))
}

fn unspecified_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}

/// Non-blocking UDP sender to a fixed collector endpoint.
pub struct UdpSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSender {
    pub fn connect(addr: &str) -> Result<Self, TransportError> {
        let target = resolve(addr)?;
        let local = unspecified_for(&target);
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local.to_string(),
            source,
        })?;
        socket.set_nonblocking(true)?;
        log::debug!("UDP sender {} -> {target}", socket.local_addr()?);
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl DatagramSender for UdpSender {
    fn send(&mut self, datagram: &[u8]) -> SendOutcome {
        match self.socket.send_to(datagram, self.target) {
            Ok(bytes) => SendOutcome::Sent { bytes },
            Err(e) if e.kind() == ErrorKind::WouldBlock => SendOutcome::Dropped {
                size: datagram.len(),
                reason: DropReason::WouldBlock,
            },
            Err(e) => {
                log::warn!("UDP send to {} failed: {e}", self.target);
                SendOutcome::Dropped {
                    size: datagram.len(),
                    reason: DropReason::SendFailed,
                }
            }
        }
    }
}

/// Blocking UDP receiver bound to the collector endpoint.
pub struct UdpReceiver {
    socket: UdpSocket,
}

impl UdpReceiver {
    pub fn bind(addr: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

impl DatagramReceiver for UdpReceiver {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        loop {
            match self.socket.recv_from(buf) {
                Ok((n, _)) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // Windows reports an earlier ICMP port-unreachable here
                Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Sends an empty datagram to `bound` so a receiver blocked in
/// [`UdpReceiver::recv`] returns. Unspecified addresses are reached over
/// loopback.
pub fn wake_receiver(bound: SocketAddr) -> Result<(), TransportError> {
    let target = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), bound.port())
        }
        _ => bound,
    };
    let socket = UdpSocket::bind(unspecified_for(&target))?;
    socket.send_to(&[], target)?;
    Ok(())
}

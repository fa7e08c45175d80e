pub mod datagram_transport;

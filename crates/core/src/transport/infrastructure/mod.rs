pub mod channel_transport;
pub mod size_limited_sender;
pub mod udp_transport;

//! Multicast UDP transport.
//!
//! This module provides the socket layer underneath the NMEA endpoint:
//! socket lifecycle, blocking send/receive with a timeout, and an optional
//! background listening thread.

mod config;
mod multicast;
mod worker;

pub use config::{
    BackoffStrategy, DEFAULT_BUFFER_SIZE, DEFAULT_INTERFACE, DEFAULT_TIMEOUT, TransportConfig,
};
pub use multicast::{MulticastTransport, RECV_BUFFER_SIZE};
pub(crate) use multicast::DatagramSource;

#[cfg(feature = "tokio")]
pub(crate) use multicast::open_socket;
pub(crate) use worker::{ErrorBackoff, StopToken, Worker};

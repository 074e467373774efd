//! Observer interfaces for background receive loops.
//!
//! Callbacks run synchronously on the listening thread. A callback that
//! blocks stalls all further event delivery for that transport or endpoint.
//!
//! [`ChannelListener`] and [`NmeaChannelListener`] forward events into an
//! `mpsc` channel for callers that prefer to consume events from their own
//! thread.

use std::sync::mpsc::{self, Receiver, Sender};

use bytes::Bytes;

/// Observer for raw datagram events on a transport.
///
/// Registered with [`MulticastTransport::set_listener`].
///
/// [`MulticastTransport::set_listener`]: crate::transport::MulticastTransport::set_listener
pub trait TransportListener: Send + Sync {
    /// A datagram arrived.
    fn on_data_available(&self, data: &[u8]);

    /// No datagram arrived within the receive timeout.
    fn on_timeout(&self);

    /// The socket reported an error.
    fn on_connection_error(&self);
}

/// Observer for decoded sentence events on an endpoint.
///
/// Registered with [`NmeaEndpoint::set_listener`].
///
/// [`NmeaEndpoint::set_listener`]: crate::endpoint::NmeaEndpoint::set_listener
pub trait NmeaListener: Send + Sync {
    /// A sentence arrived and its tag block checked out.
    fn on_string_available(&self, source_id: &str, sentence: &str);

    /// No datagram arrived within the receive timeout.
    fn on_timeout(&self);

    /// The socket reported an error.
    fn on_connection_error(&self);

    /// A datagram carried a corrupt or malformed tag block.
    fn on_checksum_error(&self);
}

/// Transport event as delivered by [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A datagram arrived.
    Data(Bytes),
    /// Receive timed out.
    Timeout,
    /// Socket error.
    ConnectionError,
}

/// Sentence event as delivered by [`NmeaChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NmeaEvent {
    /// A sentence arrived.
    Sentence {
        /// Source identifier from the tag block.
        source_id: String,
        /// Sentence without CR LF.
        sentence: String,
    },
    /// Receive timed out.
    Timeout,
    /// Socket error.
    ConnectionError,
    /// Corrupt tag block.
    ChecksumError,
}

/// A [`TransportListener`] that forwards events to a channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<TransportEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<TransportEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl TransportListener for ChannelListener {
    fn on_data_available(&self, data: &[u8]) {
        let _ = self.tx.send(TransportEvent::Data(Bytes::copy_from_slice(data)));
    }

    fn on_timeout(&self) {
        let _ = self.tx.send(TransportEvent::Timeout);
    }

    fn on_connection_error(&self) {
        let _ = self.tx.send(TransportEvent::ConnectionError);
    }
}

/// An [`NmeaListener`] that forwards events to a channel.
#[derive(Debug, Clone)]
pub struct NmeaChannelListener {
    tx: Sender<NmeaEvent>,
}

impl NmeaChannelListener {
    /// Create a listener and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<NmeaEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl NmeaListener for NmeaChannelListener {
    fn on_string_available(&self, source_id: &str, sentence: &str) {
        let _ = self.tx.send(NmeaEvent::Sentence {
            source_id: source_id.to_string(),
            sentence: sentence.to_string(),
        });
    }

    fn on_timeout(&self) {
        let _ = self.tx.send(NmeaEvent::Timeout);
    }

    fn on_connection_error(&self) {
        let _ = self.tx.send(NmeaEvent::ConnectionError);
    }

    fn on_checksum_error(&self) {
        let _ = self.tx.send(NmeaEvent::ChecksumError);
    }
}

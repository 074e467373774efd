//! IEC 61162-450 ("NMEA over Ethernet") multicast messaging built on std::net.
//!
//! Talkers and listeners exchange NMEA sentences over transmission groups,
//! each a fixed multicast address/port pair. This crate provides:
//!
//! - A multicast UDP transport with socket lifecycle management, blocking
//!   send/receive with a timeout, and an optional listening thread
//! - The IEC 61162-450 datagram codec: `UdPbC` header, tag block with
//!   per-source line counts and XOR checksum
//! - An endpoint combining both, with its own listening thread that reports
//!   decoded sentences to a [`NmeaListener`]
//! - Async variants behind the `tokio` feature
//!
//! This is not a sentence parser: sentences are carried as opaque strings.
//! UDP semantics are kept as they are, so datagrams may be lost,
//! duplicated or reordered.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nmea450::{NmeaChannelListener, NmeaEndpoint, NmeaEvent, TransmissionGroup};
//!
//! let mut listener_side = NmeaEndpoint::new(TransmissionGroup::Navd);
//! let (listener, events) = NmeaChannelListener::new();
//! listener_side.set_listener(Arc::new(listener));
//! listener_side.start_listening()?;
//!
//! let mut talker = NmeaEndpoint::new(TransmissionGroup::Navd);
//! talker.open()?;
//! talker.send("GP0001", "$GPHDT,274.07,T*03")?;
//!
//! if let Ok(NmeaEvent::Sentence { source_id, sentence }) = events.recv() {
//!     println!("{source_id}: {sentence}");
//! }
//! # Ok::<(), nmea450::NmeaError>(())
//! ```
//!
//! # Datagram Format
//!
//! ```text
//! +--------+---+-------------------------+---+----------+-------+
//! | UdPbC\0| \ | s:GP0001,n:17*HH        | \ | $GPHDT.. | CR LF |
//! +--------+---+-------------------------+---+----------+-------+
//! ```
//!
//! `HH` is the XOR of every tag block byte before the `*`, in upper-case
//! hex. Line counts run 1..=999 per source and then wrap to 1.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod group;
pub mod listener;
pub mod transport;

// Async modules (require tokio feature)
#[cfg(feature = "tokio")]
pub mod transport_async;

#[cfg(test)]
mod test_util;

// Re-export commonly used types at the crate root
pub use codec::{DATAGRAM_HEADER, SourceCounters, TagBlock, TaggedSentence};
pub use endpoint::NmeaEndpoint;
pub use error::{NmeaError, Result};
pub use group::TransmissionGroup;
pub use listener::{
    ChannelListener, NmeaChannelListener, NmeaEvent, NmeaListener, TransportEvent,
    TransportListener,
};
pub use transport::{MulticastTransport, TransportConfig};

//! Async transport layer using Tokio.
//!
//! This module provides async versions of the multicast transport and the
//! NMEA endpoint. There is no listening thread here: callers drive
//! `receive_one` from their own task.
//!
//! # Example
//!
//! ```no_run
//! use nmea450::transport_async::AsyncNmeaEndpoint;
//! use nmea450::TransmissionGroup;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut endpoint = AsyncNmeaEndpoint::open(TransmissionGroup::Navd)?;
//!     endpoint.send("GP0001", "$GPZDA,160012.71,11,03,2004,-1,00*7D").await?;
//!
//!     let received = endpoint.receive_one().await?;
//!     println!("{}: {}", received.source_id(), received.sentence);
//!
//!     Ok(())
//! }
//! ```

mod multicast;

pub use multicast::{AsyncMulticastTransport, AsyncNmeaEndpoint};

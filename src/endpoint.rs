//! IEC 61162-450 endpoint: tagged sentences over a transmission group.

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::codec::{SourceCounters, TaggedSentence};
use crate::error::{NmeaError, Result};
use crate::group::TransmissionGroup;
use crate::listener::NmeaListener;
use crate::transport::{
    DatagramSource, ErrorBackoff, MulticastTransport, RECV_BUFFER_SIZE, StopToken,
    TransportConfig, Worker,
};

/// A talker/listener on one transmission group.
///
/// Outgoing sentences get a tag block with the source id and that source's
/// rolling line count. Incoming datagrams are checked for the `UdPbC`
/// header and a valid tag block checksum before they reach the listener.
///
/// # Example
///
/// ```no_run
/// use nmea450::{NmeaEndpoint, TransmissionGroup};
///
/// let mut endpoint = NmeaEndpoint::new(TransmissionGroup::Navd);
/// endpoint.open()?;
/// endpoint.send("GP0001", "$GPZDA,160012.71,11,03,2004,-1,00*7D")?;
///
/// let received = endpoint.receive_one()?;
/// println!("{}: {}", received.source_id(), received.sentence);
/// # Ok::<(), nmea450::NmeaError>(())
/// ```
pub struct NmeaEndpoint {
    group: Option<TransmissionGroup>,
    transport: MulticastTransport,
    counters: SourceCounters,
    listener: Option<Arc<dyn NmeaListener>>,
    worker: Option<Worker>,
}

impl NmeaEndpoint {
    /// Create a closed endpoint on a standard transmission group.
    pub fn new(group: TransmissionGroup) -> Self {
        let transport = MulticastTransport::from_valid_config(TransportConfig::for_group(group));
        Self::from_transport(Some(group), transport)
    }

    /// Create a closed endpoint with a custom transport configuration.
    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let transport = MulticastTransport::new(config)?;
        Ok(Self::from_transport(None, transport))
    }

    fn from_transport(group: Option<TransmissionGroup>, transport: MulticastTransport) -> Self {
        Self {
            group,
            transport,
            counters: SourceCounters::new(),
            listener: None,
            worker: None,
        }
    }

    /// Transmission group, if created from one.
    pub fn group(&self) -> Option<TransmissionGroup> {
        self.group
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &MulticastTransport {
        &self.transport
    }

    /// Reset a source's line count to 1.
    pub fn register_source_id(&mut self, source_id: &str) {
        self.counters.register(source_id);
    }

    /// Line count the next `send` for this source will use.
    pub fn next_counter(&self, source_id: &str) -> Option<u16> {
        self.counters.peek(source_id)
    }

    /// Open the socket. Returns `Ok(false)` if already open.
    pub fn open(&mut self) -> Result<bool> {
        self.transport.open()
    }

    /// Close the socket, stopping the listening thread first.
    pub fn close(&mut self) -> bool {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
        self.transport.close()
    }

    /// Check if the socket is open.
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Check if the listening thread is running.
    pub fn is_listening(&self) -> bool {
        self.worker.is_some()
    }

    /// Send a sentence tagged with `source_id`.
    ///
    /// Unknown sources start at line count 1. The count advances on every
    /// call that gets as far as the socket, whether or not the send succeeds.
    /// Returns the number of bytes sent.
    pub fn send(&mut self, source_id: &str, sentence: &str) -> Result<usize> {
        if !self.transport.is_open() {
            return Err(NmeaError::NotOpen);
        }

        let max = self.transport.config().max_datagram_size;
        let datagram = self.counters.encode_next(source_id, sentence, max)?;
        trace!("sending {} bytes from {source_id}", datagram.len());
        let sent = self.transport.send(&datagram)?;
        if sent == 0 {
            return Err(NmeaError::Io(io::ErrorKind::WriteZero.into()));
        }
        Ok(sent)
    }

    /// Receive and decode one datagram, waiting up to the transport timeout.
    ///
    /// Fails with [`NmeaError::Timeout`] if nothing arrived,
    /// [`NmeaError::BadHeader`] for foreign traffic, or a checksum-class
    /// error for a corrupt tag block.
    pub fn receive_one(&self) -> Result<TaggedSentence> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let len = self.transport.receive(&mut buf)?;
        TaggedSentence::from_bytes(&buf[..len])
    }

    /// Set the listener. Takes effect at the next `start_listening`.
    pub fn set_listener(&mut self, listener: Arc<dyn NmeaListener>) {
        self.listener = Some(listener);
    }

    /// Remove the listener. Takes effect at the next `start_listening`.
    pub fn unset_listener(&mut self) {
        self.listener = None;
    }

    /// Start the listening thread, opening the socket if needed.
    ///
    /// Returns `Ok(false)` if already listening or no listener is set.
    pub fn start_listening(&mut self) -> Result<bool> {
        if self.worker.is_some() {
            return Ok(false);
        }
        let Some(listener) = self.listener.clone() else {
            debug!("no listener set for {}", self.transport.config().group_addr());
            return Ok(false);
        };

        self.transport.open()?;
        let receiver = self.transport.receiver().ok_or(NmeaError::NotOpen)?;
        let backoff = ErrorBackoff::new(self.transport.config().error_backoff.clone());

        let name = format!("nmea-{}", self.transport.config().port);
        let worker = Worker::spawn(name, move |stop| {
            run_listener(receiver, listener.as_ref(), backoff, stop)
        })?;
        self.worker = Some(worker);
        Ok(true)
    }

    /// Stop the listening thread and close the socket.
    ///
    /// Returns false if the endpoint was not listening.
    pub fn stop_listening(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        worker.stop();
        self.transport.close();
        true
    }
}

/// Copies the configuration only. The copy starts closed, with no line
/// counts and no listener.
impl Clone for NmeaEndpoint {
    fn clone(&self) -> Self {
        Self::from_transport(self.group, self.transport.clone())
    }
}

impl Drop for NmeaEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for NmeaEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NmeaEndpoint")
            .field("group", &self.group)
            .field("transport", &self.transport)
            .field("sources", &self.counters.len())
            .field("listening", &self.is_listening())
            .finish()
    }
}

fn run_listener<S: DatagramSource>(
    mut source: S,
    listener: &dyn NmeaListener,
    mut backoff: ErrorBackoff,
    stop: StopToken,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    while let Some(result) = source.receive_until(&mut buf, &stop) {
        let decoded = match result {
            Ok(0) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "empty datagram").into()),
            Ok(len) => TaggedSentence::from_bytes(&buf[..len]),
            Err(e) => Err(e),
        };
        match decoded {
            Ok(tagged) => {
                backoff.reset();
                listener.on_string_available(tagged.source_id(), &tagged.sentence);
            }
            Err(NmeaError::Timeout) => {
                backoff.reset();
                listener.on_timeout();
            }
            Err(NmeaError::NotOpen) => {
                debug!("socket closed, leaving receive loop");
                break;
            }
            Err(NmeaError::BadHeader) => trace!("dropping datagram without UdPbC header"),
            Err(e) if e.is_checksum_error() => {
                debug!("dropping datagram: {e}");
                listener.on_checksum_error();
            }
            Err(e) => {
                warn!("receive failed: {e}");
                listener.on_connection_error();
                if backoff.wait(&stop) {
                    break;
                }
            }
        }
    }
}

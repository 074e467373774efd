//! Async multicast transport and NMEA endpoint.

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::codec::{SourceCounters, TaggedSentence};
use crate::error::{NmeaError, Result};
use crate::group::TransmissionGroup;
use crate::transport::{RECV_BUFFER_SIZE, TransportConfig, open_socket};

/// An async multicast UDP socket bound to one group and port.
///
/// The socket is opened on construction and closed on drop. Must be created
/// inside a Tokio runtime.
#[derive(Debug)]
pub struct AsyncMulticastTransport {
    config: TransportConfig,
    socket: UdpSocket,
}

impl AsyncMulticastTransport {
    /// Validate the config and open the socket.
    pub fn open(config: TransportConfig) -> Result<Self> {
        config.validate()?;

        let socket = open_socket(&config)?;
        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket)?;
        debug!("opened async socket for {}", config.group_addr());

        Ok(Self { config, socket })
    }

    /// Get the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send one datagram to the group.
    pub async fn send(&self, data: &[u8]) -> Result<usize> {
        let len = self.socket.send_to(data, self.config.group_addr()).await?;
        trace!("sent {len} bytes to {}", self.config.group_addr());
        Ok(len)
    }

    /// Receive one datagram, waiting up to the configured timeout.
    pub async fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        timeout(self.config.timeout, self.socket.recv(buf))
            .await
            .map_err(|_| NmeaError::Timeout)?
            .map_err(NmeaError::from)
    }
}

/// An async talker/listener on one transmission group.
#[derive(Debug)]
pub struct AsyncNmeaEndpoint {
    transport: AsyncMulticastTransport,
    counters: SourceCounters,
    recv_buffer: Vec<u8>,
}

impl AsyncNmeaEndpoint {
    /// Open an endpoint on a standard transmission group.
    pub fn open(group: TransmissionGroup) -> Result<Self> {
        Self::with_config(TransportConfig::for_group(group))
    }

    /// Open an endpoint with a custom transport configuration.
    pub fn with_config(config: TransportConfig) -> Result<Self> {
        Ok(Self {
            transport: AsyncMulticastTransport::open(config)?,
            counters: SourceCounters::new(),
            recv_buffer: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &AsyncMulticastTransport {
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

    /// Send a sentence tagged with `source_id`.
    pub async fn send(&mut self, source_id: &str, sentence: &str) -> Result<usize> {
        let max = self.transport.config().max_datagram_size;
        let datagram = self.counters.encode_next(source_id, sentence, max)?;
        self.transport.send(&datagram).await
    }

    /// Receive and decode one datagram, waiting up to the transport timeout.
    pub async fn receive_one(&mut self) -> Result<TaggedSentence> {
        let len = self.transport.receive(&mut self.recv_buffer).await?;
        TaggedSentence::from_bytes(&self.recv_buffer[..len])
    }
}

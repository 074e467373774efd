//! Transport configuration types.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use crate::codec::DEFAULT_MAX_DATAGRAM_SIZE;
use crate::error::{NmeaError, Result};
use crate::group::TransmissionGroup;

/// Default bind interface (kernel picks the route).
pub const DEFAULT_INTERFACE: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Default receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Socket buffer size requested on open, halved until the kernel accepts it.
pub const DEFAULT_BUFFER_SIZE: usize = 32768;

/// Backoff strategy between repeated connection errors.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// No delay at all.
    None,
    /// Fixed delay between attempts.
    Fixed(Duration),
    /// Exponential backoff with configurable parameters.
    Exponential {
        /// Initial delay.
        base: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier for each attempt.
        multiplier: f64,
    },
    /// Linear backoff with configurable parameters.
    Linear {
        /// Initial delay.
        initial: Duration,
        /// Increment per attempt.
        increment: Duration,
        /// Maximum delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::None => Duration::ZERO,
            BackoffStrategy::Fixed(d) => *d,
            BackoffStrategy::Exponential {
                base,
                max,
                multiplier,
            } => {
                let exp = attempt.min(i32::MAX as u32) as i32;
                let delay_ms = base.as_millis() as f64 * multiplier.powi(exp);
                Duration::from_millis(delay_ms.min(max.as_millis() as f64) as u64)
            }
            BackoffStrategy::Linear {
                initial,
                increment,
                max,
            } => {
                let delay = increment
                    .checked_mul(attempt)
                    .and_then(|inc| initial.checked_add(inc))
                    .unwrap_or(*max);
                delay.min(*max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base: Duration::from_millis(50),
            max: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

/// Configuration of one multicast transport.
///
/// Cloning a config never clones a socket; transports built from the same
/// config own independent sockets.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Local interface used to join the group and send.
    pub interface: Ipv4Addr,
    /// Multicast group address.
    pub group: Ipv4Addr,
    /// UDP port.
    pub port: u16,
    /// Receive timeout.
    pub timeout: Duration,
    /// Initial send/receive socket buffer size request.
    pub buffer_size: usize,
    /// Largest datagram accepted for sending.
    pub max_datagram_size: usize,
    /// Delay policy applied by listening loops after connection errors.
    pub error_backoff: BackoffStrategy,
}

impl TransportConfig {
    /// Create a config for a group address and port with default settings.
    pub fn new(group: Ipv4Addr, port: u16) -> Self {
        Self {
            interface: DEFAULT_INTERFACE,
            group,
            port,
            timeout: DEFAULT_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            error_backoff: BackoffStrategy::default(),
        }
    }

    /// Create a config for a standard transmission group.
    pub fn for_group(group: TransmissionGroup) -> Self {
        let (addr, port) = group.resolve();
        Self::new(addr, port)
    }

    /// Set the local interface.
    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    /// Set the receive timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the initial socket buffer size request.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the largest datagram accepted for sending.
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    /// Set the backoff applied after connection errors.
    pub fn with_error_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Group address and port as a socket address.
    pub fn group_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.group, self.port)
    }

    /// Check that the group address is in 224.0.0.0/4.
    pub fn validate(&self) -> Result<()> {
        if !self.group.is_multicast() {
            return Err(NmeaError::InvalidAddress(self.group));
        }
        Ok(())
    }
}

/// Defaults to the MISC transmission group.
impl Default for TransportConfig {
    fn default() -> Self {
        Self::for_group(TransmissionGroup::Misc)
    }
}

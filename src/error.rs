//! Error types for NMEA multicast operations.

use std::io;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors that can occur while talking or listening on a transmission group.
#[derive(Error, Debug)]
pub enum NmeaError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Group address outside 224.0.0.0/4.
    #[error("Invalid multicast address: {0} is not in 224.0.0.0/4")]
    InvalidAddress(Ipv4Addr),

    /// No datagram arrived within the receive timeout.
    #[error("Operation timed out")]
    Timeout,

    /// The socket has not been opened.
    #[error("Socket is not open")]
    NotOpen,

    /// Datagram does not start with the `UdPbC\0` header.
    #[error("Bad datagram header")]
    BadHeader,

    /// Tag block is missing, truncated, or lacks a required field.
    #[error("Malformed tag block: {0}")]
    MalformedTagBlock(String),

    /// Tag block checksum does not match its content.
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Encoded datagram would not fit in one datagram buffer.
    #[error("Sentence too large: {size} bytes exceeds maximum of {max} bytes")]
    SentenceTooLarge { size: usize, max: usize },

    /// Source identifier contains tag block delimiters.
    #[error("Invalid source id: {0:?}")]
    InvalidSourceId(String),
}

/// Result type alias for NMEA multicast operations.
pub type Result<T> = std::result::Result<T, NmeaError>;

impl NmeaError {
    /// Create a new malformed tag block error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedTagBlock(msg.into())
    }

    /// Check if this error is recoverable (transient).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(e) if e.kind() == io::ErrorKind::WouldBlock
                || e.kind() == io::ErrorKind::TimedOut
                || e.kind() == io::ErrorKind::Interrupted
        ) || matches!(self, Self::Timeout)
    }

    /// Check if this error came from a corrupt tag block rather than the network.
    pub fn is_checksum_error(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. } | Self::MalformedTagBlock(_))
    }
}

//! Error types for the VAGABOND transport.

use std::io;

use thiserror::Error;

/// Errors in the crypto layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key text is not valid base64.
    #[error("key is not valid base64")]
    KeyDecode,

    /// Key material has the wrong length.
    #[error("key must be {expected} bytes, got {actual}")]
    KeyLength {
        /// Required key length.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// AEAD seal failed.
    #[error("AEAD seal failed")]
    SealFailed,

    /// AEAD open failed: bad tag, truncated, or corrupted datagram.
    #[error("AEAD open failed (bad tag or corrupted datagram)")]
    BadAuth,
}

/// Errors in the transport layer.
///
/// Per-datagram failures (`BadAuth`, `Malformed`, `Oversize`,
/// `DirectionViolation`) never take the connection down; callers drop the
/// datagram and keep polling. Resource and construction failures are fatal.
#[derive(Debug, Error)]
pub enum NetError {
    /// Datagram socket creation failed.
    #[error("socket creation failed: {0}")]
    SocketCreate(#[source] io::Error),

    /// No port in the search range could be bound.
    #[error("bind failed: {0}")]
    Bind(#[source] io::Error),

    /// Closing a socket's file descriptor failed.
    #[error("close failed: {0}")]
    Close(#[source] io::Error),

    /// Numeric address resolution failed (DNS is never consulted).
    #[error("cannot resolve address: {0}")]
    Resolve(String),

    /// The requested bind address could not be parsed.
    #[error("invalid address")]
    InvalidAddress,

    /// Port spec did not match `port` or `low:high` with low <= high.
    #[error("invalid port range {0:?}")]
    InvalidPortRange(String),

    /// `sendto` failed or wrote a short datagram.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// `recvmsg` failed.
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    /// Datagram exceeded the receive buffer and was truncated by the kernel.
    #[error("received oversize datagram")]
    Oversize,

    /// Decrypted plaintext is shorter than the packet header.
    #[error("datagram shorter than packet header")]
    Malformed,

    /// Datagram carries our own direction bit: a replay of our own traffic.
    #[error("datagram direction matches our own send direction")]
    DirectionViolation,

    /// Crypto-layer failure while sealing or opening a datagram.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl NetError {
    /// True when a non-blocking receive found nothing to read.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Receive(e) if e.kind() == io::ErrorKind::WouldBlock)
    }

    /// The OS errno behind this error, when one exists.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::SocketCreate(e)
            | Self::Bind(e)
            | Self::Close(e)
            | Self::Send(e)
            | Self::Receive(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

/// Result alias for transport operations.
pub type NetResult<T> = Result<T, NetError>;

//! One bound UDP socket plus the per-path state the transport keeps for it.

use std::io;
use std::mem::ManuallyDrop;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

use socket2::SockAddr;
use tracing::warn;

use super::timing::RttEstimator;
use crate::core::{
    NetError, NetResult, CONGESTION_TIMESTAMP_PENALTY, DEFAULT_SEND_MTU, SAVED_TIMESTAMP_WINDOW,
    TIMESTAMP_NONE,
};
use crate::platform;

/// A socket endpoint: the fd and the path metadata that lives with it.
///
/// Endpoints are owned exclusively by their connection and move, never clone;
/// two owners of one fd would race the close.
pub struct Socket {
    io: ManuallyDrop<socket2::Socket>,
    /// Last-known send MTU for this path.
    pub(crate) mtu: usize,
    /// Most recent peer timestamp to echo (`TIMESTAMP_NONE` when empty).
    pub(crate) saved_timestamp: u16,
    /// When `saved_timestamp` was stamped, in clock ms.
    pub(crate) saved_timestamp_received_at: u64,
    /// RTT estimator for this path.
    pub(crate) rtt: RttEstimator,
    /// Next sequence number to assign.
    pub(crate) next_seq: u64,
    /// This socket's identifier within its connection.
    pub(crate) sock_id: u16,
}

impl Socket {
    /// Create an unbound endpoint of the given family with the transport
    /// socket options applied.
    pub(crate) fn new(ipv4: bool, sock_id: u16) -> NetResult<Self> {
        let io = platform::udp_socket(ipv4).map_err(NetError::SocketCreate)?;
        Ok(Self {
            io: ManuallyDrop::new(io),
            mtu: DEFAULT_SEND_MTU,
            saved_timestamp: TIMESTAMP_NONE,
            saved_timestamp_received_at: 0,
            rtt: RttEstimator::new(),
            next_seq: 0,
            sock_id,
        })
    }

    /// Bind to a local address. Callers may retry across a port range.
    pub(crate) fn bind(&self, addr: SocketAddr) -> io::Result<()> {
        self.io.bind(&SockAddr::from(addr))
    }

    /// The bound local address.
    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        self.io
            .local_addr()?
            .as_socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "non-inet local address"))
    }

    /// The raw file descriptor, for external polling.
    pub fn fd(&self) -> RawFd {
        self.io.as_raw_fd()
    }

    /// Take the next sequence number.
    pub(crate) fn assign_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Remember a peer timestamp for echoing. A CE mark walks the sample
    /// back, so the peer's next RTT computation sees an inflated dwell time
    /// and slows toward its minimum frame rate.
    pub(crate) fn store_peer_timestamp(&mut self, timestamp: u16, now: u64, congestion: bool) {
        self.saved_timestamp = if congestion {
            timestamp.wrapping_sub(CONGESTION_TIMESTAMP_PENALTY)
        } else {
            timestamp
        };
        self.saved_timestamp_received_at = now;
    }

    /// The timestamp echo for an outgoing packet: the saved peer timestamp
    /// advanced by how long we held it, or `TIMESTAMP_NONE`.
    ///
    /// Samples older than the freshness window are never echoed, and an
    /// emitted sample is cleared so it cannot be echoed twice.
    pub(crate) fn take_timestamp_reply(&mut self, now: u64) -> u16 {
        if self.saved_timestamp == TIMESTAMP_NONE {
            return TIMESTAMP_NONE;
        }
        let held_for = now.saturating_sub(self.saved_timestamp_received_at);
        if held_for >= SAVED_TIMESTAMP_WINDOW {
            return TIMESTAMP_NONE;
        }

        let reply = self.saved_timestamp.wrapping_add(held_for as u16);
        self.saved_timestamp = TIMESTAMP_NONE;
        self.saved_timestamp_received_at = 0;
        reply
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        // SAFETY: self.io is never touched again after take().
        let io = unsafe { ManuallyDrop::take(&mut self.io) };
        if let Err(err) = platform::close_socket(io) {
            let err = NetError::Close(err);
            warn!(%err, sock_id = self.sock_id, "socket teardown failed");
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("fd", &self.fd())
            .field("sock_id", &self.sock_id)
            .field("mtu", &self.mtu)
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

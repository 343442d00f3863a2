//! The wire packet and its codec.
//!
//! A packet's 64-bit nonce folds together the direction bit (bit 63) and the
//! 63-bit sequence number. The cleartext layout, all big-endian, is:
//!
//! ```text
//! [ timestamp (2) | timestamp_reply (2) | sock_id (2) | flags (2) | payload ]
//! ```

use crate::core::{CryptoError, NetError, NetResult, PACKET_HEADER_SIZE, PROBE_FLAG};
use crate::crypto::Session;

const DIRECTION_MASK: u64 = 1 << 63;
const SEQUENCE_MASK: u64 = !DIRECTION_MASK;

/// Who a packet is addressed to.
///
/// A connection sends in exactly one direction, so the bit doubles as a
/// defense against our own traffic being played back at us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server.
    ToServer,
    /// Server to client.
    ToClient,
}

impl Direction {
    /// The direction the peer sends in.
    pub fn opposite(self) -> Self {
        match self {
            Self::ToServer => Self::ToClient,
            Self::ToClient => Self::ToServer,
        }
    }
}

/// One decoded application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// 63-bit monotonic sequence, assigned by the sending socket.
    pub seq: u64,
    /// Direction of travel, recovered from the nonce's top bit.
    pub direction: Direction,
    /// Sender wall-clock at transmit, mod 65536 ms (`0xFFFF` = none).
    pub timestamp: u16,
    /// Echo of the peer's last timestamp, advanced by dwell (`0xFFFF` = none).
    pub timestamp_reply: u16,
    /// Identifier of the sending socket within its connection.
    pub sock_id: u16,
    /// Bitfield; bit 0 marks a probe.
    pub flags: u16,
    /// Opaque application bytes.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Whether this packet is a heartbeat probe.
    pub fn is_probe(&self) -> bool {
        self.flags & PROBE_FLAG != 0
    }

    /// The AEAD nonce: direction bit over the 63-bit sequence.
    pub fn nonce(&self) -> u64 {
        let dir = match self.direction {
            Direction::ToClient => DIRECTION_MASK,
            Direction::ToServer => 0,
        };
        dir | (self.seq & SEQUENCE_MASK)
    }

    /// Seal this packet into a wire datagram.
    pub fn encode(&self, session: &Session) -> Result<Vec<u8>, CryptoError> {
        let mut cleartext = Vec::with_capacity(PACKET_HEADER_SIZE + self.payload.len());
        cleartext.extend_from_slice(&self.timestamp.to_be_bytes());
        cleartext.extend_from_slice(&self.timestamp_reply.to_be_bytes());
        cleartext.extend_from_slice(&self.sock_id.to_be_bytes());
        cleartext.extend_from_slice(&self.flags.to_be_bytes());
        cleartext.extend_from_slice(&self.payload);

        session.encrypt(self.nonce(), &cleartext)
    }

    /// Open a wire datagram into a packet.
    pub fn decode(datagram: &[u8], session: &Session) -> NetResult<Self> {
        let (nonce, cleartext) = session.decrypt(datagram)?;
        if cleartext.len() < PACKET_HEADER_SIZE {
            return Err(NetError::Malformed);
        }

        let field = |i: usize| u16::from_be_bytes([cleartext[2 * i], cleartext[2 * i + 1]]);

        Ok(Self {
            seq: nonce & SEQUENCE_MASK,
            direction: if nonce & DIRECTION_MASK != 0 {
                Direction::ToClient
            } else {
                Direction::ToServer
            },
            timestamp: field(0),
            timestamp_reply: field(1),
            sock_id: field(2),
            flags: field(3),
            payload: cleartext[PACKET_HEADER_SIZE..].to_vec(),
        })
    }
}

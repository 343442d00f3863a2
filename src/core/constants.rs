//! Protocol constants.
//!
//! These values are fixed by the wire protocol and its timing contract;
//! changing them breaks interoperability with deployed peers.

// =============================================================================
// DATAGRAM SIZES
// =============================================================================

/// Largest datagram we will accept, ciphertext included.
pub const RECEIVE_MTU: usize = 1500;

/// Initial send MTU assumed for a fresh socket.
pub const DEFAULT_SEND_MTU: usize = 1300;

/// Payload MTU of last resort, applied after `EMSGSIZE`.
pub const FALLBACK_SEND_MTU: usize = 500;

/// Cleartext packet header: timestamp, timestamp_reply, sock_id, flags.
pub const PACKET_HEADER_SIZE: usize = 8;

/// The 64-bit packet nonce travels in the clear ahead of the ciphertext.
pub const WIRE_NONCE_SIZE: usize = 8;

/// Poly1305 authentication tag size.
pub const AEAD_TAG_SIZE: usize = 16;

// =============================================================================
// PACKET FLAGS
// =============================================================================

/// Heartbeat packet with empty (or ignored) payload.
pub const PROBE_FLAG: u16 = 0x0001;

/// Reserved 16-bit timestamp value meaning "no timestamp".
pub const TIMESTAMP_NONE: u16 = 0xFFFF;

// =============================================================================
// RTT ESTIMATION
// =============================================================================

/// Minimum retransmission timeout (ms).
pub const MIN_RTO: u64 = 50;

/// Maximum retransmission timeout (ms).
pub const MAX_RTO: u64 = 1000;

/// Smoothed RTT before the first sample (ms).
pub const INITIAL_SRTT: f64 = 1000.0;

/// RTT variance before the first sample (ms).
pub const INITIAL_RTTVAR: f64 = 500.0;

/// Alpha for SRTT smoothing (1/8 per Jacobson/Karels).
pub const SRTT_ALPHA: f64 = 0.125;

/// Beta for RTTVAR smoothing (1/4 per Jacobson/Karels).
pub const RTTVAR_BETA: f64 = 0.25;

/// RTT samples at or above this are implausible (suspended peer) and dropped.
pub const MAX_RTT_SAMPLE_MS: u64 = 5000;

// =============================================================================
// CONNECTION TIMING (ms)
// =============================================================================

/// A server that has not heard from its client for this long detaches.
pub const SERVER_ASSOCIATION_TIMEOUT: u64 = 40_000;

/// Minimum quiet period before the client hops to a fresh source port.
pub const PORT_HOP_INTERVAL: u64 = 10_000;

/// Sockets older than the latest port choice by this much are pruned.
pub const MAX_OLD_SOCKET_AGE: u64 = 60_000;

/// Hard cap on concurrently open receive sockets.
pub const MAX_PORTS_OPEN: usize = 10;

/// Penalty subtracted from the echoed timestamp when CE is observed,
/// inflating the peer's next RTT sample.
pub const CONGESTION_TIMESTAMP_PENALTY: u16 = 500;

/// A saved peer timestamp older than this is never echoed.
pub const SAVED_TIMESTAMP_WINDOW: u64 = 1000;

// =============================================================================
// SERVER PORT SEARCH
// =============================================================================

/// Low end of the default server port search range.
pub const PORT_RANGE_LOW: u16 = 60001;

/// High end of the default server port search range.
pub const PORT_RANGE_HIGH: u16 = 60999;

//! # VAGABOND
//!
//! A roaming datagram transport for mobile interactive applications.
//!
//! VAGABOND carries authenticated, encrypted, length-bounded messages over
//! UDP between one client and one server, and keeps working while the client
//! changes IP address, gets rebound by a NAT, or disappears for a while. It
//! provides:
//!
//! - **Roaming**: the server re-learns the peer address from every
//!   authenticated in-window datagram
//! - **Port hopping**: the client moves to a fresh source port after
//!   prolonged silence, defeating stateful middleboxes
//! - **Replay protection**: per-socket strictly-increasing acceptance for
//!   every state-mutating effect
//! - **RTT estimation**: 16-bit timestamp echoes feeding Jacobson/Karels
//!   smoothing, with a clamped retransmission timeout for the layer above
//! - **Congestion signaling**: ECN marks are relayed back to the sender
//!   through a penalized timestamp echo
//!
//! Delivery is unordered and unreliable by design; the layer above is
//! expected to synchronize idempotent state rather than stream bytes.
//!
//! ## Example
//!
//! ```no_run
//! use vagabond::Connection;
//!
//! # fn main() -> Result<(), vagabond::NetError> {
//! let mut server = Connection::server("127.0.0.1", None)?;
//! let (key, port) = (server.get_key(), server.port()?);
//!
//! // ... key and port travel to the client over a bootstrap channel ...
//!
//! let mut client = Connection::client(&key, "127.0.0.1", &port)?;
//! client.send(b"hello");
//! let _payload = server.recv()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod crypto;
mod platform;
pub mod transport;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::core::{CryptoError, NetError, NetResult};
    pub use crate::crypto::{Base64Key, Session};
    pub use crate::transport::{Connection, Direction, Packet, RttEstimator};
}

pub use crate::core::{CryptoError, NetError, NetResult};
pub use crate::crypto::{Base64Key, Session};
pub use crate::platform::host_addresses;
pub use crate::transport::{Connection, Direction, Packet};

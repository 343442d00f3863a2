//! Transport layer: the roaming connection and everything under it.
//!
//! - [`Connection`]: socket fan-out, replay gating, roaming, port hopping
//! - [`Packet`]: the wire packet and its AEAD codec
//! - [`Socket`]: one bound UDP fd plus its per-path state
//! - [`RttEstimator`]: Jacobson/Karels SRTT/RTTVAR with a clamped RTO
//! - [`clock`], [`addr`], [`port`]: timestamps, numeric addressing, port specs
//!
//! The layer is single-threaded and cooperative: callers poll the fds from
//! [`Connection::fds`] and drive [`Connection::recv`]; only the terminal
//! receive on the newest socket blocks.

pub mod addr;
pub mod clock;
mod connection;
mod packet;
pub mod port;
mod socket;
mod timing;

pub use connection::Connection;
pub use packet::{Direction, Packet};
pub use socket::Socket;
pub use timing::RttEstimator;

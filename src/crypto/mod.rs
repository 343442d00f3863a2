//! Security layer: shared-secret key handling and the datagram AEAD session.
//!
//! Key exchange and provisioning live outside this crate; the key reaches the
//! client as base64 text over the bootstrap channel.

mod key;
mod session;

pub use key::{Base64Key, KEY_SIZE};
pub use session::Session;

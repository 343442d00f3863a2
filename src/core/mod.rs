//! Core layer: protocol constants and error types shared by every module.

pub mod constants;
mod error;

pub use constants::*;
pub use error::{CryptoError, NetError, NetResult};

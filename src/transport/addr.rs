//! Numeric address handling.
//!
//! Peer addresses are plain [`SocketAddr`] values (orderable and hashable);
//! the helpers here parse text forms without ever consulting DNS, so a
//! malicious resolver cannot redirect the transport.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::core::{NetError, NetResult};

/// Resolve a numeric `(ip, port)` pair into a socket address.
pub fn resolve_numeric(ip: &str, port: &str) -> NetResult<SocketAddr> {
    let ip: IpAddr = ip
        .parse()
        .map_err(|_| NetError::Resolve(format!("bad IP address ({ip})")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| NetError::Resolve(format!("bad port ({port})")))?;
    Ok(SocketAddr::new(ip, port))
}

/// The wildcard (unspecified) address of the same family as `addr`.
pub fn wildcard(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

//! Raw datagram I/O.
//!
//! Everything that has to reach below `std::net` lives here: `recvmsg` with
//! its ECN ancillary data, explicitly-addressed `sendto`, the socket option
//! sequence applied to every transport socket, and interface enumeration.

mod cmsg;

use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::ptr;

use socket2::{Domain, SockAddr, Socket, Type};
use tracing::debug;

/// TOS byte advertising an ECN-capable transport, ECT(0).
const ECN_ECT0: libc::c_int = 0x02;

/// Low two TOS bits set: congestion experienced.
const ECN_CE_MASK: u8 = 0x03;

/// Room for the TOS/TCLASS control message plus slack.
const CONTROL_LEN: usize = 64;

/// What one `recvmsg` call produced, besides the payload bytes.
#[derive(Debug)]
pub(crate) struct Received {
    /// Bytes written into the caller's buffer.
    pub len: usize,
    /// Source address of the datagram, when the kernel reported one.
    pub source: Option<SocketAddr>,
    /// The IP TOS byte carried the CE codepoint.
    pub congestion: bool,
    /// The datagram exceeded the buffer and was truncated.
    pub truncated: bool,
}

/// Create an unbound UDP socket of the given family and apply the transport
/// option sequence. Option failures are best-effort: logged, never fatal.
pub(crate) fn udp_socket(ipv4: bool) -> io::Result<Socket> {
    let domain = if ipv4 { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, None)?;
    let fd = socket.as_raw_fd();

    // Never let the kernel negotiate path MTU for us; fragmentation beats
    // blackholing on roaming paths.
    #[cfg(target_os = "linux")]
    {
        let (level, name) = if ipv4 {
            (libc::IPPROTO_IP, libc::IP_MTU_DISCOVER)
        } else {
            (libc::IPPROTO_IPV6, libc::IPV6_MTU_DISCOVER)
        };
        if let Err(err) = set_opt(fd, level, name, libc::IP_PMTUDISC_DONT) {
            debug!(%err, "could not disable path MTU discovery");
        }
    }

    if ipv4 {
        let _ = set_opt(fd, libc::IPPROTO_IP, libc::IP_TOS, ECN_ECT0);
        if let Err(err) = set_opt(fd, libc::IPPROTO_IP, libc::IP_RECVTOS, 1) {
            debug!(%err, "could not enable IP_RECVTOS");
        }
    } else {
        let _ = set_opt(fd, libc::IPPROTO_IPV6, libc::IPV6_TCLASS, ECN_ECT0);
        if let Err(err) = set_opt(fd, libc::IPPROTO_IPV6, libc::IPV6_RECVTCLASS, 1) {
            debug!(%err, "could not enable IPV6_RECVTCLASS");
        }
    }

    Ok(socket)
}

fn set_opt(fd: RawFd, level: libc::c_int, name: libc::c_int, value: libc::c_int) -> io::Result<()> {
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const _ as *const libc::c_void,
            mem::size_of_val(&value) as libc::socklen_t,
        )
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Receive one datagram, reading the source address and the TOS byte from
/// ancillary data. `nonblocking` maps to `MSG_DONTWAIT`, so the fd itself
/// stays blocking for terminal receive calls.
pub(crate) fn recv_datagram(fd: RawFd, buf: &mut [u8], nonblocking: bool) -> io::Result<Received> {
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let mut control = cmsg::Aligned([0u8; CONTROL_LEN]);
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };

    let mut hdr: libc::msghdr = unsafe { mem::zeroed() };
    hdr.msg_name = &mut storage as *mut _ as *mut libc::c_void;
    hdr.msg_namelen = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    hdr.msg_iov = &mut iov;
    hdr.msg_iovlen = 1;
    hdr.msg_control = control.0.as_mut_ptr() as *mut libc::c_void;
    hdr.msg_controllen = CONTROL_LEN as _;

    let flags = if nonblocking { libc::MSG_DONTWAIT } else { 0 };
    let len = loop {
        let n = unsafe { libc::recvmsg(fd, &mut hdr, flags) };
        if n == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        break n as usize;
    };

    let mut tos = 0u8;
    for msg in unsafe { cmsg::Iter::new(&hdr) } {
        match (msg.cmsg_level, msg.cmsg_type) {
            // FreeBSD reports IP_RECVTOS here; Linux and macOS report IP_TOS.
            (libc::IPPROTO_IP, libc::IP_TOS) | (libc::IPPROTO_IP, libc::IP_RECVTOS) => {
                tos = unsafe { cmsg::decode::<u8>(msg) };
            }
            (libc::IPPROTO_IPV6, libc::IPV6_TCLASS) => {
                tos = unsafe { cmsg::decode::<libc::c_int>(msg) } as u8;
            }
            _ => {}
        }
    }

    let source = decode_source(&storage);

    Ok(Received {
        len,
        source,
        congestion: tos & ECN_CE_MASK == ECN_CE_MASK,
        truncated: hdr.msg_flags & libc::MSG_TRUNC != 0,
    })
}

fn decode_source(storage: &libc::sockaddr_storage) -> Option<SocketAddr> {
    match storage.ss_family as libc::c_int {
        libc::AF_INET => {
            let sin = unsafe { ptr::read(storage as *const _ as *const libc::sockaddr_in) };
            Some(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)),
                u16::from_be(sin.sin_port),
            )))
        }
        libc::AF_INET6 => {
            let sin6 = unsafe { ptr::read(storage as *const _ as *const libc::sockaddr_in6) };
            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

/// Send one datagram to an explicit destination without blocking.
///
/// The socket is deliberately never connected, so a single fd can answer a
/// peer that has roamed to a new address.
pub(crate) fn send_datagram(fd: RawFd, datagram: &[u8], dest: SocketAddr) -> io::Result<usize> {
    let addr = SockAddr::from(dest);
    loop {
        let n = unsafe {
            libc::sendto(
                fd,
                datagram.as_ptr() as *const libc::c_void,
                datagram.len(),
                libc::MSG_DONTWAIT,
                addr.as_ptr(),
                addr.len(),
            )
        };
        if n == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(n as usize);
    }
}

/// Close a socket, surfacing the close result instead of dropping it.
pub(crate) fn close_socket(socket: Socket) -> io::Result<()> {
    let fd = socket.into_raw_fd();
    if unsafe { libc::close(fd) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Enumerate the host's current IPv4/IPv6 interface addresses.
///
/// Diagnostic only: nothing in the transport consumes the result.
pub fn host_addresses() -> io::Result<Vec<IpAddr>> {
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut ifap) } == -1 {
        return Err(io::Error::last_os_error());
    }

    let mut addresses = Vec::new();
    let mut cursor = ifap;
    while !cursor.is_null() {
        let ifa = unsafe { &*cursor };
        if !ifa.ifa_addr.is_null() {
            match unsafe { (*ifa.ifa_addr).sa_family } as libc::c_int {
                libc::AF_INET => {
                    let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
                    addresses.push(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))));
                }
                libc::AF_INET6 => {
                    let sin6 = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in6) };
                    addresses.push(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)));
                }
                _ => {}
            }
        }
        cursor = ifa.ifa_next;
    }
    unsafe { libc::freeifaddrs(ifap) };

    addresses.sort_unstable();
    addresses.dedup();
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    #[test]
    fn send_and_recv_roundtrip() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let dest = receiver.local_addr().unwrap();
        let sender = udp_socket(true).unwrap();

        let sent = send_datagram(sender.as_raw_fd(), b"ping", dest).unwrap();
        assert_eq!(sent, 4);

        let mut buf = [0u8; 64];
        let rcv = recv_datagram(receiver.as_raw_fd(), &mut buf, false).unwrap();
        assert_eq!(&buf[..rcv.len], b"ping");
        assert!(!rcv.truncated);
        assert!(rcv.source.is_some());
    }

    #[test]
    fn nonblocking_recv_would_block() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut buf = [0u8; 64];
        let err = recv_datagram(receiver.as_raw_fd(), &mut buf, true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn oversize_datagram_is_flagged_truncated() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let dest = receiver.local_addr().unwrap();
        let sender = udp_socket(true).unwrap();

        send_datagram(sender.as_raw_fd(), &[0xAB; 128], dest).unwrap();

        let mut buf = [0u8; 16];
        let rcv = recv_datagram(receiver.as_raw_fd(), &mut buf, false).unwrap();
        assert!(rcv.truncated);
    }

    #[test]
    fn host_addresses_contains_loopback() {
        let addrs = host_addresses().unwrap();
        assert!(addrs.contains(&IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }
}

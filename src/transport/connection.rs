//! The roaming connection: socket fan-out, replay gating, and liveness.
//!
//! A connection owns a FIFO of socket endpoints (oldest first) and exactly
//! one remote peer. Servers re-learn the peer address from every in-window
//! datagram so a roaming client is followed automatically; clients hop to a
//! fresh source port after prolonged silence to shake off stateful
//! middleboxes.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::os::fd::RawFd;

use tracing::{debug, info, warn};

use super::addr;
use super::clock;
use super::packet::{Direction, Packet};
use super::port::parse_port_range;
use super::socket::Socket;
use crate::core::{
    NetError, NetResult, FALLBACK_SEND_MTU, MAX_OLD_SOCKET_AGE, MAX_PORTS_OPEN, MAX_RTT_SAMPLE_MS,
    PORT_HOP_INTERVAL, PORT_RANGE_HIGH, PORT_RANGE_LOW, PROBE_FLAG, RECEIVE_MTU,
    SERVER_ASSOCIATION_TIMEOUT, TIMESTAMP_NONE,
};
use crate::crypto::{Base64Key, Session};
use crate::platform;

/// An authenticated, encrypted datagram connection to a single peer.
///
/// Servers are built with [`Connection::server`] and clients with
/// [`Connection::client`]; the role fixes the outbound packet direction,
/// address-learning behavior, and port-hop eligibility.
pub struct Connection {
    /// Owned socket endpoints, oldest first.
    socks: VecDeque<Socket>,
    next_sock_id: u16,
    /// `sock_id` of the endpoint outbound traffic uses; `None` once a server
    /// has detached from an idle client.
    send_sock: Option<u16>,
    remote_addr: Option<SocketAddr>,
    server: bool,
    session: Session,
    /// Next acceptable sequence per peer `sock_id`. The gate guards every
    /// state update an attacker could otherwise perturb by replaying.
    expected_receiver_seq: HashMap<u16, u64>,
    last_heard: u64,
    last_port_choice: u64,
    last_roundtrip_success: u64,
    /// Last send failure, kept for the frontend instead of altering control
    /// flow; datagrams are lossy anyway.
    send_exception: Option<NetError>,
}

impl Connection {
    /// Build a server: generates a fresh session key and binds a socket on
    /// `desired_ip`, searching `desired_port` (a port or `low:high` range;
    /// `None` or empty means the default range). If the requested address
    /// cannot be bound the wildcard address of the same family is tried
    /// before giving up.
    pub fn server(desired_ip: &str, desired_port: Option<&str>) -> NetResult<Self> {
        let mut conn = Self::with_role(Session::new(Base64Key::random()), true, None);

        let (low, high) = match desired_port.filter(|spec| !spec.is_empty()) {
            Some(spec) => {
                let (low, high) = parse_port_range(spec)?;
                // port 0 means "no preference" for that bound
                let low = if low == 0 { PORT_RANGE_LOW } else { low };
                let high = if high == 0 { PORT_RANGE_HIGH } else { high };
                if low > high {
                    return Err(NetError::InvalidPortRange(spec.to_string()));
                }
                (low, high)
            }
            None => (PORT_RANGE_LOW, PORT_RANGE_HIGH),
        };

        let ip: IpAddr = desired_ip.parse().map_err(|_| NetError::InvalidAddress)?;
        match conn.try_bind(ip, low, high) {
            Ok(()) => return Ok(conn),
            Err(err) => {
                warn!(%err, %ip, "bind to requested address failed, retrying on the wildcard")
            }
        }
        conn.try_bind(addr::wildcard(ip), low, high)?;
        Ok(conn)
    }

    /// Build a client from the server's printable key and its numeric
    /// address. The socket is neither bound nor connected: the kernel picks
    /// the source port on first send, and explicit addressing lets one fd
    /// serve a roamed peer.
    pub fn client(key: &str, ip: &str, port: &str) -> NetResult<Self> {
        let key = Base64Key::from_printable(key)?;
        let remote = addr::resolve_numeric(ip, port)?;

        let mut conn = Self::with_role(Session::new(key), false, Some(remote));
        let sock = Socket::new(remote.is_ipv4(), conn.alloc_sock_id())?;
        conn.send_sock = Some(sock.sock_id);
        conn.socks.push_back(sock);
        Ok(conn)
    }

    fn with_role(session: Session, server: bool, remote_addr: Option<SocketAddr>) -> Self {
        let now = clock::now_ms();
        Self {
            socks: VecDeque::new(),
            next_sock_id: 0,
            send_sock: None,
            remote_addr,
            server,
            session,
            expected_receiver_seq: HashMap::new(),
            last_heard: now,
            last_port_choice: now,
            last_roundtrip_success: now,
            send_exception: None,
        }
    }

    /// Create one socket and bind it to the first free port in
    /// `[low, high]`. The errno of the final port is surfaced on failure.
    fn try_bind(&mut self, ip: IpAddr, low: u16, high: u16) -> NetResult<()> {
        let sock = Socket::new(ip.is_ipv4(), self.alloc_sock_id())?;
        for port in low..=high {
            match sock.bind(SocketAddr::new(ip, port)) {
                Ok(()) => {
                    // send_sock stays unset: the server is detached until a
                    // client datagram names the reply path
                    self.socks.push_back(sock);
                    return Ok(());
                }
                Err(err) if port == high => {
                    warn!(%ip, port, %err, "failed to bind last port in search range");
                    return Err(NetError::Bind(err));
                }
                Err(_) => continue,
            }
        }
        unreachable!("port search returns at the final port")
    }

    fn alloc_sock_id(&mut self) -> u16 {
        let id = self.next_sock_id;
        self.next_sock_id = self.next_sock_id.wrapping_add(1);
        id
    }

    /// Outbound packet direction for this role.
    fn direction(&self) -> Direction {
        if self.server {
            Direction::ToClient
        } else {
            Direction::ToServer
        }
    }

    /// Send one payload to the peer.
    ///
    /// A detached server silently drops the payload. Failures are recorded
    /// for [`Connection::get_send_exception`] rather than returned; a
    /// successful send clears the record. `EMSGSIZE` additionally clamps the
    /// sending socket's MTU.
    pub fn send(&mut self, payload: &[u8]) {
        let (Some(idx), Some(dest)) = (self.send_sock_index(), self.remote_addr) else {
            return;
        };

        let packet = self.new_packet(idx, 0, payload);
        let datagram = match packet.encode(&self.session) {
            Ok(datagram) => datagram,
            Err(err) => {
                self.send_exception = Some(err.into());
                return;
            }
        };

        match platform::send_datagram(self.socks[idx].fd(), &datagram, dest) {
            Ok(sent) if sent == datagram.len() => self.send_exception = None,
            Ok(_) => {
                self.send_exception = Some(NetError::Send(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "short datagram write",
                )));
            }
            Err(err) => {
                if err.raw_os_error() == Some(libc::EMSGSIZE) {
                    self.socks[idx].mtu = FALLBACK_SEND_MTU;
                    debug!(mtu = FALLBACK_SEND_MTU, "EMSGSIZE, lowering send MTU");
                }
                self.send_exception = Some(NetError::Send(err));
            }
        }

        self.post_send_housekeeping(clock::now_ms());
    }

    fn post_send_housekeeping(&mut self, now: u64) {
        if self.server {
            if now.saturating_sub(self.last_heard) > SERVER_ASSOCIATION_TIMEOUT {
                self.send_sock = None;
                warn!("server detached from idle client");
            }
        } else if now.saturating_sub(self.last_port_choice) > PORT_HOP_INTERVAL
            && now.saturating_sub(self.last_roundtrip_success) > PORT_HOP_INTERVAL
        {
            if let Err(err) = self.hop_port() {
                self.send_exception = Some(err);
            }
        }
    }

    /// Assemble the next outgoing packet on `socks[idx]`.
    fn new_packet(&mut self, idx: usize, flags: u16, payload: &[u8]) -> Packet {
        let direction = self.direction();
        let now = clock::now_ms();

        // Lift the socket's counter to the connection-wide high-water mark:
        // counters are per socket, but nonces must never repeat per key and
        // direction, even across a port hop.
        let floor = self.socks.iter().map(|s| s.next_seq).max().unwrap_or(0);
        let sock = &mut self.socks[idx];
        sock.next_seq = sock.next_seq.max(floor);

        Packet {
            seq: sock.assign_seq(),
            direction,
            timestamp: clock::now_ms16(),
            timestamp_reply: sock.take_timestamp_reply(now),
            sock_id: sock.sock_id,
            flags,
            payload: payload.to_vec(),
        }
    }

    /// Receive one payload from the peer.
    ///
    /// Polls every socket oldest to newest without blocking, then blocks on
    /// the newest. Duplicate and out-of-order datagrams are still delivered
    /// (the layer above is idempotent); only their state side effects are
    /// suppressed.
    pub fn recv(&mut self) -> NetResult<Vec<u8>> {
        assert!(!self.socks.is_empty(), "connection owns at least one socket");
        let last = self.socks.len() - 1;
        for idx in 0..=last {
            match self.recv_one(idx, idx != last) {
                Ok(payload) => {
                    self.prune_sockets(clock::now_ms());
                    return Ok(payload);
                }
                Err(err) if idx != last && err.is_would_block() => continue,
                Err(err) => return Err(err),
            }
        }
        unreachable!("terminal receive either blocks or returns")
    }

    fn recv_one(&mut self, idx: usize, nonblocking: bool) -> NetResult<Vec<u8>> {
        let mut buf = [0u8; RECEIVE_MTU];
        let received = platform::recv_datagram(self.socks[idx].fd(), &mut buf, nonblocking)
            .map_err(NetError::Receive)?;
        if received.truncated {
            return Err(NetError::Oversize);
        }

        let packet = Packet::decode(&buf[..received.len], &self.session)?;
        self.process_packet(idx, packet, received.source, received.congestion)
    }

    /// Validate one decoded packet and apply its state effects.
    fn process_packet(
        &mut self,
        idx: usize,
        packet: Packet,
        source: Option<SocketAddr>,
        congestion: bool,
    ) -> NetResult<Vec<u8>> {
        if packet.direction == self.direction() {
            // our own traffic played back at us
            debug!(seq = packet.seq, "dropping datagram with our own direction bit");
            return Err(NetError::DirectionViolation);
        }

        let expected = self
            .expected_receiver_seq
            .get(&packet.sock_id)
            .copied()
            .unwrap_or(0);
        if packet.seq < expected {
            // Out-of-order or duplicate: deliver the payload but leave the
            // timestamp, liveness, and peer address state untouched.
            return Ok(packet.payload);
        }
        self.expected_receiver_seq.insert(packet.sock_id, packet.seq + 1);

        let now = clock::now_ms();
        {
            let sock = &mut self.socks[idx];
            if packet.timestamp != TIMESTAMP_NONE {
                sock.store_peer_timestamp(packet.timestamp, now, congestion);
                if congestion && self.server {
                    info!("received explicit congestion notification");
                }
            }

            if packet.timestamp_reply != TIMESTAMP_NONE {
                let sample = clock::ts_diff(clock::now_ms16(), packet.timestamp_reply);
                // a peer suspended mid-echo produces an absurd sample
                if u64::from(sample) < MAX_RTT_SAMPLE_MS {
                    sock.rtt.on_sample(f64::from(sample));
                }
            }
        }
        self.last_heard = now;

        if packet.is_probe() {
            if self.server {
                if let Some(source) = source {
                    if let Err(err) = self.send_probe(idx, source) {
                        debug!(%err, "probe reply failed");
                    }
                }
            }
            if !packet.payload.is_empty() {
                debug!("probe carried a payload");
            }
            return Ok(packet.payload);
        }

        if self.server {
            // the endpoint this datagram arrived on becomes the reply path
            self.send_sock = Some(self.socks[idx].sock_id);
            if let Some(source) = source {
                if self.remote_addr != Some(source) {
                    self.remote_addr = Some(source);
                    info!(peer = %source, "server attached to client");
                }
            }
        }

        Ok(packet.payload)
    }

    /// Emit a heartbeat probe on every non-active socket, keeping their NAT
    /// bindings fresh and their RTT estimates current. Best-effort.
    pub fn send_probes(&mut self) {
        let Some(dest) = self.remote_addr else {
            return;
        };
        for idx in 0..self.socks.len() {
            if Some(self.socks[idx].sock_id) == self.send_sock {
                continue;
            }
            if let Err(err) = self.send_probe(idx, dest) {
                debug!(%err, sock_id = self.socks[idx].sock_id, "probe send failed");
            }
        }
    }

    fn send_probe(&mut self, idx: usize, dest: SocketAddr) -> NetResult<()> {
        let probe = self.new_packet(idx, PROBE_FLAG, &[]);
        let datagram = probe.encode(&self.session)?;
        platform::send_datagram(self.socks[idx].fd(), &datagram, dest).map_err(NetError::Send)?;
        Ok(())
    }

    /// Open a fresh source port and make it the active send path.
    fn hop_port(&mut self) -> NetResult<()> {
        debug_assert!(!self.server, "only the client hops ports");
        let Some(remote) = self.remote_addr else {
            return Err(NetError::InvalidAddress);
        };

        self.last_port_choice = clock::now_ms();
        let sock = Socket::new(remote.is_ipv4(), self.alloc_sock_id())?;
        debug!(sock_id = sock.sock_id, "hopping to a fresh source port");
        self.send_sock = Some(sock.sock_id);
        self.socks.push_back(sock);

        self.prune_sockets(clock::now_ms());
        Ok(())
    }

    /// Drop old sockets once the newest has proven itself, and cap how many
    /// stay open regardless.
    fn prune_sockets(&mut self, now: u64) {
        if self.socks.len() > 1 && now.saturating_sub(self.last_port_choice) > MAX_OLD_SOCKET_AGE {
            while self.socks.len() > 1 {
                self.socks.pop_front();
            }
        }
        while self.socks.len() > MAX_PORTS_OPEN {
            self.socks.pop_front();
        }
    }

    /// The endpoint outbound traffic would use: the active send socket, or
    /// the newest socket while a server is detached.
    fn sock(&self) -> &Socket {
        if let Some(sock) = self
            .send_sock
            .and_then(|id| self.socks.iter().find(|s| s.sock_id == id))
        {
            return sock;
        }
        self.socks.back().expect("connection owns at least one socket")
    }

    fn send_sock_index(&self) -> Option<usize> {
        let id = self.send_sock?;
        self.socks.iter().position(|s| s.sock_id == id)
    }

    /// File descriptors of every socket, oldest first, for external polling.
    pub fn fds(&self) -> Vec<RawFd> {
        self.socks.iter().map(Socket::fd).collect()
    }

    /// Retransmission timeout for the active path, in milliseconds.
    pub fn timeout(&self) -> u64 {
        self.sock().rtt.rto()
    }

    /// Smoothed RTT of the active path, in milliseconds.
    pub fn get_srtt(&self) -> f64 {
        self.sock().rtt.srtt()
    }

    /// Send MTU of the active path.
    pub fn get_mtu(&self) -> usize {
        self.sock().mtu
    }

    /// The bound local port of the active socket, as text.
    pub fn port(&self) -> NetResult<String> {
        let local = self
            .sock()
            .local_addr()
            .map_err(|err| NetError::Resolve(format!("getsockname: {err}")))?;
        Ok(local.port().to_string())
    }

    /// The printable session key, for handoff to the peer process.
    pub fn get_key(&self) -> String {
        self.session.key().printable()
    }

    /// Whether we currently have a peer to send to.
    pub fn has_remote_addr(&self) -> bool {
        self.send_sock.is_some()
    }

    /// The current peer address, if one is known.
    pub fn get_remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The most recent send failure, if the last send failed.
    pub fn get_send_exception(&self) -> Option<&NetError> {
        self.send_exception.as_ref()
    }

    /// Record when the layer above last completed a round trip; recent
    /// success suppresses port hopping.
    pub fn set_last_roundtrip_success(&mut self, at_ms: u64) {
        self.last_roundtrip_success = at_ms;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("server", &self.server)
            .field("socks", &self.socks.len())
            .field("send_sock", &self.send_sock)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CONGESTION_TIMESTAMP_PENALTY, DEFAULT_SEND_MTU};
    use std::collections::HashSet;
    use std::net::UdpSocket;
    use std::time::Duration;

    fn pair() -> (Connection, Connection) {
        let server = Connection::server("127.0.0.1", None).unwrap();
        let port = server.port().unwrap();
        let client = Connection::client(&server.get_key(), "127.0.0.1", &port).unwrap();
        (server, client)
    }

    fn lone_client() -> Connection {
        let key = Base64Key::random().printable();
        // port 9 (discard) is never handed out as an ephemeral port, so no
        // parallel test can be listening there
        Connection::client(&key, "127.0.0.1", "9").unwrap()
    }

    fn raw_socket() -> UdpSocket {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        sock
    }

    fn server_session(server: &Connection) -> Session {
        Session::new(Base64Key::from_printable(&server.get_key()).unwrap())
    }

    fn server_addr(server: &Connection) -> SocketAddr {
        format!("127.0.0.1:{}", server.port().unwrap())
            .parse()
            .unwrap()
    }

    fn to_server_packet(seq: u64, sock_id: u16, payload: &[u8]) -> Packet {
        Packet {
            seq,
            direction: Direction::ToServer,
            timestamp: 777,
            timestamp_reply: TIMESTAMP_NONE,
            sock_id,
            flags: 0,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn echo_roundtrip_updates_srtt() {
        let (mut server, mut client) = pair();

        client.send(b"hello");
        assert_eq!(server.recv().unwrap(), b"hello");
        server.send(b"world");
        assert_eq!(client.recv().unwrap(), b"world");

        // the reply echoed our timestamp, so the client has a real sample;
        // on loopback the sample may legitimately be zero milliseconds
        assert!(client.sock().rtt.has_sample());
        assert!(client.get_srtt() < 5000.0);
    }

    #[test]
    fn server_follows_roaming_client() {
        let (mut server, mut client) = pair();

        client.send(b"from A");
        assert_eq!(server.recv().unwrap(), b"from A");
        let addr_a = server.get_remote_addr().unwrap();

        client.hop_port().unwrap();
        client.send(b"from B");
        assert_eq!(server.recv().unwrap(), b"from B");
        let addr_b = server.get_remote_addr().unwrap();
        assert_ne!(addr_a, addr_b);

        // replies now target the roamed address
        server.send(b"welcome back");
        assert_eq!(client.recv().unwrap(), b"welcome back");
    }

    #[test]
    fn replay_is_delivered_but_updates_nothing() {
        let mut server = Connection::server("127.0.0.1", None).unwrap();
        let session = server_session(&server);
        let raw = raw_socket();
        let dest = server_addr(&server);

        let fresh = to_server_packet(5, 9, b"data");
        raw.send_to(&fresh.encode(&session).unwrap(), dest).unwrap();
        assert_eq!(server.recv().unwrap(), b"data");
        assert_eq!(server.expected_receiver_seq[&9], 6);
        assert_eq!(server.socks[0].saved_timestamp, 777);

        // plant sentinels so any illegal update is visible
        server.last_heard = 42;
        server.socks[0].saved_timestamp = 111;
        server.send_sock = None;
        server.remote_addr = None;

        let stale = Packet {
            timestamp: 999,
            ..to_server_packet(3, 9, b"old")
        };
        raw.send_to(&stale.encode(&session).unwrap(), dest).unwrap();
        assert_eq!(server.recv().unwrap(), b"old");

        assert_eq!(server.expected_receiver_seq[&9], 6);
        assert_eq!(server.socks[0].saved_timestamp, 111);
        assert_eq!(server.last_heard, 42);
        assert_eq!(server.send_sock, None);
        assert_eq!(server.remote_addr, None);
    }

    #[test]
    fn congestion_mark_penalizes_saved_timestamp() {
        let mut server = Connection::server("127.0.0.1", None).unwrap();
        let packet = to_server_packet(0, 0, b"");
        let source = Some("127.0.0.1:9999".parse().unwrap());

        server.process_packet(0, packet, source, true).unwrap();
        assert_eq!(
            server.socks[0].saved_timestamp,
            777 - CONGESTION_TIMESTAMP_PENALTY
        );
    }

    #[test]
    fn own_direction_is_rejected_as_replay() {
        let raw = raw_socket();
        let key = Base64Key::random();
        let port = raw.local_addr().unwrap().port().to_string();
        let mut client = Connection::client(&key.printable(), "127.0.0.1", &port).unwrap();

        // first send binds the client's ephemeral port
        client.send(b"bind me");
        let mut buf = [0u8; 2048];
        let (_, client_addr) = raw.recv_from(&mut buf).unwrap();

        let session = Session::new(key);
        let looped = to_server_packet(99, 0, b"loopback");
        raw.send_to(&looped.encode(&session).unwrap(), client_addr)
            .unwrap();
        assert!(matches!(client.recv(), Err(NetError::DirectionViolation)));
    }

    #[test]
    fn server_answers_probe_without_attaching() {
        let mut server = Connection::server("127.0.0.1", None).unwrap();
        let session = server_session(&server);
        let raw = raw_socket();

        let probe = Packet {
            flags: PROBE_FLAG,
            ..to_server_packet(0, 4, b"")
        };
        raw.send_to(&probe.encode(&session).unwrap(), server_addr(&server))
            .unwrap();
        assert_eq!(server.recv().unwrap(), b"");

        // probes never attach the server
        assert!(!server.has_remote_addr());
        assert_eq!(server.get_remote_addr(), None);

        let mut buf = [0u8; 2048];
        let (n, _) = raw.recv_from(&mut buf).unwrap();
        let reply = Packet::decode(&buf[..n], &session).unwrap();
        assert!(reply.is_probe());
        assert_eq!(reply.direction, Direction::ToClient);
        // the reply echoes our probe's timestamp
        assert_ne!(reply.timestamp_reply, TIMESTAMP_NONE);
    }

    #[test]
    fn hop_port_appends_and_activates() {
        let mut client = lone_client();
        let old = client.send_sock;

        client.hop_port().unwrap();
        assert_eq!(client.socks.len(), 2);
        assert_ne!(client.send_sock, old);
        assert_eq!(client.send_sock, Some(client.socks[1].sock_id));
    }

    #[test]
    fn quiet_client_hops_on_send() {
        let mut client = lone_client();
        client.last_port_choice = 0;
        client.last_roundtrip_success = 0;

        client.post_send_housekeeping(PORT_HOP_INTERVAL + 1);
        assert_eq!(client.socks.len(), 2);
    }

    #[test]
    fn recent_roundtrip_suppresses_hop() {
        let mut client = lone_client();
        client.last_port_choice = 0;
        client.set_last_roundtrip_success(PORT_HOP_INTERVAL);

        client.post_send_housekeeping(PORT_HOP_INTERVAL + 1);
        assert_eq!(client.socks.len(), 1);
    }

    #[test]
    fn prune_caps_open_sockets() {
        let mut client = lone_client();
        for _ in 0..MAX_PORTS_OPEN + 5 {
            client.hop_port().unwrap();
        }
        assert!(client.socks.len() <= MAX_PORTS_OPEN);
    }

    #[test]
    fn prune_keeps_only_the_newest_once_aged() {
        let mut client = lone_client();
        client.hop_port().unwrap();
        client.hop_port().unwrap();
        assert!(client.socks.len() > 1);

        client.prune_sockets(clock::now_ms() + MAX_OLD_SOCKET_AGE + 1);
        assert_eq!(client.socks.len(), 1);
        assert_eq!(Some(client.socks[0].sock_id), client.send_sock);
    }

    #[test]
    fn server_detaches_after_association_timeout() {
        let mut server = Connection::server("127.0.0.1", None).unwrap();
        server.send_sock = Some(server.socks[0].sock_id);
        server.remote_addr = Some("127.0.0.1:2000".parse().unwrap());
        server.last_heard = 0;

        server.post_send_housekeeping(SERVER_ASSOCIATION_TIMEOUT + 1);
        assert!(!server.has_remote_addr());

        // a detached server's send is a no-op
        server.send(b"into the void");
        assert!(server.get_send_exception().is_none());
    }

    #[test]
    fn emsgsize_clamps_mtu_and_records_exception() {
        let mut client = lone_client();
        assert_eq!(client.get_mtu(), DEFAULT_SEND_MTU);

        client.send(&vec![0u8; 70_000]);
        let err = client.get_send_exception().expect("failure is recorded");
        assert_eq!(err.raw_os_error(), Some(libc::EMSGSIZE));
        assert_eq!(client.get_mtu(), FALLBACK_SEND_MTU);

        // the next successful send clears the record
        client.send(b"small");
        assert!(client.get_send_exception().is_none());
    }

    #[test]
    fn wire_nonces_never_repeat_across_sockets() {
        let raw = raw_socket();
        let key = Base64Key::random();
        let port = raw.local_addr().unwrap().port().to_string();
        let mut client = Connection::client(&key.printable(), "127.0.0.1", &port).unwrap();

        for i in 0..3u8 {
            client.send(&[i]);
        }
        client.hop_port().unwrap();
        for i in 3..5u8 {
            client.send(&[i]);
        }
        client.send_probes(); // one probe from the dethroned socket

        let mut nonces = HashSet::new();
        let mut buf = [0u8; 2048];
        for _ in 0..6 {
            let (n, _) = raw.recv_from(&mut buf).unwrap();
            assert!(n >= 8);
            let nonce = u64::from_be_bytes(buf[..8].try_into().unwrap());
            assert_eq!(nonce >> 63, 0, "client packets carry the to-server bit");
            assert!(nonces.insert(nonce), "nonce {nonce} repeated");
        }
    }

    #[test]
    fn fds_lists_every_socket_oldest_first() {
        let mut client = lone_client();
        assert_eq!(client.fds().len(), 1);
        client.hop_port().unwrap();
        let fds = client.fds();
        assert_eq!(fds.len(), 2);
        assert_eq!(fds[0], client.socks[0].fd());
        assert_eq!(fds[1], client.socks[1].fd());
    }

    #[test]
    fn timeout_is_clamped() {
        let client = lone_client();
        // no samples yet: srtt 1000 + 4 * 500 clamps to MAX_RTO
        assert_eq!(client.timeout(), crate::core::MAX_RTO);
    }

    #[test]
    fn server_requires_parsable_ip() {
        assert!(matches!(
            Connection::server("not-an-ip", None),
            Err(NetError::InvalidAddress)
        ));
    }

    #[test]
    fn server_rejects_bad_port_spec() {
        assert!(matches!(
            Connection::server("127.0.0.1", Some("1:2:3")),
            Err(NetError::InvalidPortRange(_))
        ));
    }
}

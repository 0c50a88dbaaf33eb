// Host liveness probes and reverse name lookup
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use hickory_resolver::TokioResolver;
use hickory_resolver::name_server::TokioConnectionProvider;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::{IcmpCodes, MutableEchoRequestPacket};
use pnet::packet::icmp::{checksum, IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, warn};

use crate::scanner::results::PortStatus;
use crate::scanner::tcp::connect_scan;

const ECHO_PAYLOAD: &[u8] = b"lanscope";
const ECHO_HEADER_LEN: usize = 8;

/// Ports tried by the connect-based liveness check. An accept or an
/// active refusal both prove the host is up.
pub const TCP_PING_PORTS: [u16; 4] = [80, 443, 22, 445];

/// Decides whether a single address is up within `timeout`.
/// Implementations swallow every failure and answer `false`.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, addr: Ipv4Addr, timeout: Duration) -> bool;

    fn name(&self) -> &'static str;
}

/// Best-effort reverse lookup; `None` covers every failure.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn reverse_lookup(&self, addr: Ipv4Addr) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpSocketKind {
    /// Unprivileged ICMP datagram socket (Linux `ping_group_range`, macOS).
    Datagram,
    /// Raw ICMP socket, needs root or CAP_NET_RAW.
    Raw,
}

impl IcmpSocketKind {
    fn socket_type(self) -> Type {
        match self {
            IcmpSocketKind::Datagram => Type::DGRAM,
            IcmpSocketKind::Raw => Type::RAW,
        }
    }
}

/// One ICMP echo request, one bounded wait for the matching reply.
#[derive(Debug, Clone, Copy)]
pub struct IcmpProbe {
    kind: IcmpSocketKind,
}

impl IcmpProbe {
    /// Pick the first ICMP socket flavour this process is allowed to open.
    pub fn open() -> io::Result<Self> {
        for kind in [IcmpSocketKind::Datagram, IcmpSocketKind::Raw] {
            match Socket::new(Domain::IPV4, kind.socket_type(), Some(Protocol::ICMPV4)) {
                Ok(_) => return Ok(Self { kind }),
                Err(e) => debug!(?kind, error = %e, "ICMP socket unavailable"),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "no ICMP socket could be opened",
        ))
    }

    pub fn kind(&self) -> IcmpSocketKind {
        self.kind
    }
}

#[async_trait]
impl ReachabilityProbe for IcmpProbe {
    async fn probe(&self, addr: Ipv4Addr, timeout: Duration) -> bool {
        let kind = self.kind;
        match tokio::task::spawn_blocking(move || echo(kind, addr, timeout)).await {
            Ok(Ok(alive)) => alive,
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "echo probe failed");
                false
            }
            Err(e) => {
                debug!(%addr, error = %e, "echo probe task failed");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.kind {
            IcmpSocketKind::Datagram => "icmp-dgram",
            IcmpSocketKind::Raw => "icmp-raw",
        }
    }
}

fn echo(kind: IcmpSocketKind, target: Ipv4Addr, timeout: Duration) -> io::Result<bool> {
    let socket: UdpSocket = Socket::new(Domain::IPV4, kind.socket_type(), Some(Protocol::ICMPV4))?.into();

    let identifier: u16 = rand::random();
    let sequence: u16 = rand::random();
    let request = build_echo_request(identifier, sequence)?;
    socket.send_to(&request, SocketAddr::V4(SocketAddrV4::new(target, 0)))?;

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 1500];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(false);
        }
        socket.set_read_timeout(Some(remaining))?;

        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(false);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if from.ip() != IpAddr::V4(target) {
            continue;
        }

        // Raw sockets hand us the IPv4 header too; the kernel rewrites the
        // identifier on datagram sockets so only the sequence is ours there.
        let matched = match kind {
            IcmpSocketKind::Raw => strip_ipv4_header(&buf[..len])
                .map(|icmp| is_echo_reply(icmp, Some(identifier), sequence))
                .unwrap_or(false),
            IcmpSocketKind::Datagram => is_echo_reply(&buf[..len], None, sequence),
        };
        if matched {
            return Ok(true);
        }
    }
}

fn build_echo_request(identifier: u16, sequence: u16) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; ECHO_HEADER_LEN + ECHO_PAYLOAD.len()];
    let mut packet = MutableEchoRequestPacket::new(&mut buf)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "echo request buffer too small"))?;

    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_icmp_code(IcmpCodes::NoCode);
    packet.set_identifier(identifier);
    packet.set_sequence_number(sequence);
    packet.set_payload(ECHO_PAYLOAD);

    let icmp = IcmpPacket::new(packet.packet())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "malformed echo request"))?;
    let sum = checksum(&icmp);
    packet.set_checksum(sum);

    Ok(buf)
}

fn strip_ipv4_header(datagram: &[u8]) -> Option<&[u8]> {
    let header_len = Ipv4Packet::new(datagram)?.get_header_length() as usize * 4;
    datagram.get(header_len..)
}

fn is_echo_reply(icmp: &[u8], identifier: Option<u16>, sequence: u16) -> bool {
    let Some(reply) = EchoReplyPacket::new(icmp) else {
        return false;
    };
    reply.get_icmp_type() == IcmpTypes::EchoReply
        && reply.get_sequence_number() == sequence
        && identifier.map_or(true, |id| reply.get_identifier() == id)
}

/// Connect-based liveness for hosts we cannot ping without privileges.
#[derive(Debug, Clone)]
pub struct TcpPingProbe {
    ports: Vec<u16>,
}

impl TcpPingProbe {
    pub fn with_ports(ports: Vec<u16>) -> Self {
        Self { ports }
    }
}

impl Default for TcpPingProbe {
    fn default() -> Self {
        Self::with_ports(TCP_PING_PORTS.to_vec())
    }
}

#[async_trait]
impl ReachabilityProbe for TcpPingProbe {
    async fn probe(&self, addr: Ipv4Addr, timeout: Duration) -> bool {
        let mut attempts: FuturesUnordered<_> = self
            .ports
            .iter()
            .map(|&port| connect_scan(IpAddr::V4(addr), port, timeout))
            .collect();

        while let Some(status) = attempts.next().await {
            if matches!(status, PortStatus::Open | PortStatus::Closed) {
                return true;
            }
        }
        false
    }

    fn name(&self) -> &'static str {
        "tcp-connect"
    }
}

/// ICMP when the process may open an ICMP socket, TCP connect otherwise.
pub fn system_probe() -> Arc<dyn ReachabilityProbe> {
    match IcmpProbe::open() {
        Ok(probe) => {
            debug!(kind = ?probe.kind(), "using ICMP echo for host discovery");
            Arc::new(probe)
        }
        Err(e) => {
            warn!(error = %e, "ICMP unavailable, falling back to TCP connect liveness checks");
            Arc::new(TcpPingProbe::default())
        }
    }
}

/// Reverse lookups through the system resolver configuration and hosts file.
#[derive(Clone)]
pub struct DnsResolver {
    resolver: TokioResolver,
}

impl DnsResolver {
    pub fn from_system() -> anyhow::Result<Self> {
        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?.build();
        Ok(Self { resolver })
    }
}

#[async_trait]
impl NameResolver for DnsResolver {
    async fn reverse_lookup(&self, addr: Ipv4Addr) -> Option<String> {
        let lookup = self.resolver.reverse_lookup(IpAddr::V4(addr)).await.ok()?;
        lookup
            .iter()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .find(|name| !name.is_empty())
    }
}

/// Used with `--no-dns`; every host shows up as "unknown".
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

#[async_trait]
impl NameResolver for NoopResolver {
    async fn reverse_lookup(&self, _addr: Ipv4Addr) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::icmp::echo_reply::MutableEchoReplyPacket;
    use tokio::net::TcpListener;

    fn reply(identifier: u16, sequence: u16) -> Vec<u8> {
        let mut buf = vec![0u8; ECHO_HEADER_LEN + ECHO_PAYLOAD.len()];
        let mut packet = MutableEchoReplyPacket::new(&mut buf).unwrap();
        packet.set_icmp_type(IcmpTypes::EchoReply);
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
        packet.set_payload(ECHO_PAYLOAD);
        buf
    }

    #[test]
    fn test_echo_request_layout() {
        let request = build_echo_request(0x1234, 7).unwrap();
        assert_eq!(request.len(), 16);
        assert_eq!(request[0], 8); // echo request
        assert_eq!(&request[4..6], &[0x12, 0x34]);
        assert_eq!(&request[6..8], &[0, 7]);
        assert_eq!(&request[8..], ECHO_PAYLOAD);

        let icmp = IcmpPacket::new(&request).unwrap();
        assert_eq!(checksum(&icmp), icmp.get_checksum());
    }

    #[test]
    fn test_reply_matching() {
        let packet = reply(42, 9);
        assert!(is_echo_reply(&packet, Some(42), 9));
        assert!(is_echo_reply(&packet, None, 9));
        assert!(!is_echo_reply(&packet, Some(43), 9));
        assert!(!is_echo_reply(&packet, None, 10));

        // Our own request looped back is not a reply.
        let request = build_echo_request(42, 9).unwrap();
        assert!(!is_echo_reply(&request, Some(42), 9));
        assert!(!is_echo_reply(&[0u8; 3], None, 9));
    }

    #[test]
    fn test_strip_ipv4_header() {
        let icmp = reply(1, 1);
        let mut datagram = vec![0x45u8; 1];
        datagram.extend_from_slice(&[0u8; 19]);
        datagram.extend_from_slice(&icmp);
        assert_eq!(strip_ipv4_header(&datagram), Some(&icmp[..]));
    }

    #[tokio::test]
    async fn test_tcp_ping_open_port_means_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpPingProbe::with_ports(vec![port]);
        assert!(probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_tcp_ping_refused_means_alive() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = TcpPingProbe::with_ports(vec![port]);
        assert!(probe.probe(Ipv4Addr::LOCALHOST, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_tcp_ping_without_ports_is_down() {
        let probe = TcpPingProbe::with_ports(Vec::new());
        assert!(!probe.probe(Ipv4Addr::LOCALHOST, Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_noop_resolver() {
        assert_eq!(NoopResolver.reverse_lookup(Ipv4Addr::new(192, 168, 1, 42)).await, None);
    }
}

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lanscope::scanner::probe::{NoopResolver, ReachabilityProbe, TcpPingProbe};
use lanscope::scanner::{PortRange, ScanOptions, Scanner};
use lanscope::{select, NetworkConfig, SelectionError};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct StaticNetwork {
    alive: HashSet<Ipv4Addr>,
}

#[async_trait]
impl ReachabilityProbe for StaticNetwork {
    async fn probe(&self, addr: Ipv4Addr, _timeout: Duration) -> bool {
        self.alive.contains(&addr)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

fn fast_options() -> ScanOptions {
    ScanOptions {
        probe_timeout: Duration::from_millis(200),
        resolve_timeout: Duration::from_millis(200),
        connect_timeout: Duration::from_millis(500),
        ..ScanOptions::default()
    }
}

fn scanner_for(alive: &[Ipv4Addr]) -> Scanner {
    Scanner::new(fast_options())
        .with_probe(Arc::new(StaticNetwork { alive: alive.iter().copied().collect() }))
        .with_resolver(Arc::new(NoopResolver))
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_discovery_on_slash24() {
    let config = NetworkConfig::new(
        Ipv4Addr::new(192, 168, 1, 10),
        Ipv4Addr::new(255, 255, 255, 0),
    ).unwrap();
    let target = Ipv4Addr::new(192, 168, 1, 42);
    let scanner = scanner_for(&[target]);
    let announced = Arc::new(Mutex::new(Vec::new()));

    let sink = announced.clone();
    let report = scanner.discover_hosts(&config, move |index, host| {
        sink.lock().unwrap().push((index, host.clone()));
    }).await;

    assert_eq!(report.candidates, 254);
    assert_eq!(report.network, "192.168.1.0/24");
    assert!(!report.cancelled);
    assert_eq!(report.hosts.len(), 1);
    assert_eq!(report.hosts[0].address, target);
    assert_eq!(report.hosts[0].display_name, "unknown");
    assert_eq!(announced.lock().unwrap().as_slice(), &[(1, report.hosts[0].clone())]);
}

#[tokio::test]
async fn test_port_sweep_finds_exactly_the_listeners() {
    let ssh = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ssh_port = ssh.local_addr().unwrap().port();
    let http_port = http.local_addr().unwrap().port();

    let scanner = scanner_for(&[]);
    let mut found = Vec::new();
    for port in [ssh_port, http_port] {
        let report = scanner.scan_ports(Ipv4Addr::LOCALHOST, PortRange::new(port, port).unwrap()).await;
        found.extend(report.open_ports);
    }
    found.sort_unstable();

    let mut expected = vec![ssh_port, http_port];
    expected.sort_unstable();
    assert_eq!(found, expected);
}

// Nothing else listens on 127.83.41.7, so one contiguous sweep between the two
// listeners must report them and nothing in between.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_contiguous_sweep_reports_only_the_listeners() {
    let target = Ipv4Addr::new(127, 83, 41, 7);
    let first = TcpListener::bind((target, 0)).await.unwrap();
    let second = TcpListener::bind((target, 0)).await.unwrap();
    let mut ports = vec![
        first.local_addr().unwrap().port(),
        second.local_addr().unwrap().port(),
    ];
    ports.sort_unstable();
    let (low, high) = (ports[0], ports[1]);

    let scanner = scanner_for(&[]);
    let report = scanner.scan_ports(target, PortRange::new(low, high).unwrap()).await;

    assert_eq!(report.open_ports, vec![low, high]);
    assert_eq!(report.attempted, (high - low) as usize + 1);
    assert!(!report.cancelled);
}

#[tokio::test]
async fn test_port_sweep_without_listeners_reports_nothing() {
    let port = free_port().await;
    let scanner = scanner_for(&[]);

    let report = scanner.scan_ports(Ipv4Addr::LOCALHOST, PortRange::new(port, port).unwrap()).await;

    assert!(!report.has_open_ports());
    assert!(!report.cancelled);
    assert_eq!(report.attempted, 1);
}

#[tokio::test]
async fn test_cancelled_port_sweep() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let scanner = scanner_for(&[]).with_cancellation(cancel);

    let report = scanner.scan_ports(Ipv4Addr::LOCALHOST, PortRange::ALL).await;

    assert!(report.cancelled);
    assert_eq!(report.attempted, 0);
    assert!(report.open_ports.is_empty());
}

#[test]
fn test_selection_bounds() {
    let hosts: Vec<_> = (1..=4)
        .map(|i| lanscope::Host::new(Ipv4Addr::new(10, 0, 0, i), None))
        .collect();

    assert_eq!(select(&hosts, 0), Err(SelectionError::OutOfRange { index: 0, count: 4 }));
    assert_eq!(select(&hosts, 5), Err(SelectionError::OutOfRange { index: 5, count: 4 }));
    assert_eq!(select(&hosts, 4).unwrap().address, Ipv4Addr::new(10, 0, 0, 4));
}

// The whole 127/8 block answers on Linux loopback, so every candidate of a
// small 127.0.0.x subnet refuses connections and counts as alive.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_discover_select_and_sweep_over_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = listener.local_addr().unwrap().port();
    let closed_port = free_port().await;

    let config = NetworkConfig::from_cidr("127.0.0.1/29").unwrap();
    let scanner = Scanner::new(fast_options())
        .with_probe(Arc::new(TcpPingProbe::with_ports(vec![closed_port])))
        .with_resolver(Arc::new(NoopResolver));

    let discovery = scanner.discover_hosts(&config, |_, _| {}).await;
    let addresses: HashSet<Ipv4Addr> = discovery.hosts.iter().map(|h| h.address).collect();
    assert_eq!(addresses, config.candidates().collect());

    let index = discovery
        .hosts
        .iter()
        .position(|h| h.address == Ipv4Addr::LOCALHOST)
        .unwrap() + 1;
    let target = select(&discovery.hosts, index).unwrap();

    let report = scanner.scan_ports(target.address, PortRange::new(open_port, open_port).unwrap()).await;
    assert_eq!(report.open_ports, vec![open_port]);
}

pub mod discovery;
pub mod pool;
pub mod ports;
pub mod probe;
pub mod results;
pub mod store;
pub mod tcp;

use std::net::Ipv4Addr;
use std::sync::Arc;
use indicatif::ProgressBar;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::network::NetworkConfig;
use discovery::HostDiscovery;
use ports::PortScanner;
use probe::{DnsResolver, NameResolver, NoopResolver, ReachabilityProbe};
pub use results::{DiscoveryReport, Host, PortRange, PortScanReport, PortStatus, UNKNOWN_HOSTNAME};
pub use store::ResultStore;

/// Timeouts, pool sizes and result bounds for both phases.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub probe_timeout: Duration,
    pub resolve_timeout: Duration,
    pub connect_timeout: Duration,
    pub host_concurrency: usize,
    pub port_concurrency: usize,
    pub host_bound: usize,
    pub port_bound: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(1),
            resolve_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            // The TCP liveness fallback opens one socket per ping port, keep
            // the total under a default 1024 descriptor limit.
            host_concurrency: 128,
            port_concurrency: 512,
            host_bound: 256,
            port_bound: 128,
        }
    }
}

pub struct Scanner {
    options: ScanOptions,
    probe: Arc<dyn ReachabilityProbe>,
    resolver: Arc<dyn NameResolver>,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl Scanner {
    /// Uses ICMP (or the TCP fallback) and the system DNS configuration.
    pub fn new(options: ScanOptions) -> Self {
        let resolver: Arc<dyn NameResolver> = match DnsResolver::from_system() {
            Ok(resolver) => Arc::new(resolver),
            Err(e) => {
                warn!(error = %e, "system resolver unavailable, host names will be unknown");
                Arc::new(NoopResolver)
            }
        };

        Self {
            options,
            probe: probe::system_probe(),
            resolver,
            cancel: CancellationToken::new(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Progress bar advanced once per port attempted. Hidden by default.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Which liveness check discovery will use, e.g. `icmp-dgram`.
    pub fn probe_name(&self) -> &'static str {
        self.probe.name()
    }

    /// Sweep the subnet of `config`, calling `on_found` as hosts turn up.
    pub async fn discover_hosts<F>(&self, config: &NetworkConfig, on_found: F) -> DiscoveryReport
    where
        F: Fn(usize, &Host) + Send + Sync + 'static,
    {
        let engine = HostDiscovery::new(
            self.probe.clone(),
            self.resolver.clone(),
            self.options.probe_timeout,
            self.options.resolve_timeout,
            self.options.host_concurrency,
            self.options.host_bound,
        );

        let start_time = chrono::Utc::now();
        let outcome = engine.discover(config.candidates(), &self.cancel, on_found).await;
        let end_time = chrono::Utc::now();

        DiscoveryReport {
            network: config.to_string(),
            local_address: config.local_address(),
            candidates: outcome.probed,
            start_time,
            end_time,
            cancelled: outcome.cancelled,
            hosts: outcome.hosts,
        }
    }

    pub async fn scan_ports(&self, target: Ipv4Addr, range: PortRange) -> PortScanReport {
        let engine = PortScanner::new(
            self.options.connect_timeout,
            self.options.port_concurrency,
            self.options.port_bound,
        );

        self.progress.set_length(range.len() as u64);
        self.progress.set_position(0);

        let start_time = chrono::Utc::now();
        let outcome = engine.scan(target, range, &self.cancel, &self.progress).await;
        let end_time = chrono::Utc::now();

        if outcome.cancelled {
            self.progress.abandon_with_message("⟦SCAN INTERRUPTED⟧");
        } else {
            self.progress.finish_with_message("⟦SCAN COMPLETE⟧");
        }

        PortScanReport {
            target,
            port_range: range,
            start_time,
            end_time,
            cancelled: outcome.cancelled,
            attempted: outcome.attempted,
            open_ports: outcome.open_ports,
        }
    }
}

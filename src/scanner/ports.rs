use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use indicatif::ProgressBar;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::scanner::pool::fan_out;
use crate::scanner::results::{PortRange, PortStatus};
use crate::scanner::store::ResultStore;
use crate::scanner::tcp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortScanOutcome {
    /// Ascending port numbers.
    pub open_ports: Vec<u16>,
    pub attempted: usize,
    pub cancelled: bool,
}

/// TCP connect sweep of one host.
pub struct PortScanner {
    connect_timeout: Duration,
    concurrency: usize,
    bound: usize,
}

impl PortScanner {
    pub fn new(connect_timeout: Duration, concurrency: usize, bound: usize) -> Self {
        Self {
            connect_timeout,
            concurrency,
            bound,
        }
    }

    pub async fn scan(
        &self,
        target: Ipv4Addr,
        range: PortRange,
        cancel: &CancellationToken,
        pb: &ProgressBar,
    ) -> PortScanOutcome {
        let store = Arc::new(ResultStore::new(self.bound));
        let connect_timeout = self.connect_timeout;

        info!(%target, ports = %range, concurrency = self.concurrency, "starting port scan");

        let run = fan_out(range.iter(), self.concurrency, cancel, |port| {
            let store = store.clone();
            let pb = pb.clone();

            async move {
                match tcp::connect_scan(IpAddr::V4(target), port, connect_timeout).await {
                    PortStatus::Open => {
                        if !store.insert_if_under_bound(port) {
                            debug!(port, "open port result set full, dropping");
                        }
                    }
                    PortStatus::Error => debug!(port, "could not allocate a socket, skipping port"),
                    PortStatus::Closed | PortStatus::Filtered => {}
                }
                pb.inc(1);
            }
        }).await;

        let mut open_ports = match Arc::try_unwrap(store) {
            Ok(store) => store.into_inner(),
            Err(store) => store.snapshot(),
        };
        open_ports.sort_unstable();

        info!(%target, attempted = run.launched, open = open_ports.len(), cancelled = run.cancelled, "port scan finished");

        PortScanOutcome {
            open_ports,
            attempted: run.launched,
            cancelled: run.cancelled,
        }
    }
}

use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::scanner::pool::fan_out;
use crate::scanner::probe::{NameResolver, ReachabilityProbe};
use crate::scanner::results::Host;
use crate::scanner::store::ResultStore;

#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub hosts: Vec<Host>,
    pub probed: usize,
    pub cancelled: bool,
}

/// Sweeps a list of candidate addresses and keeps the ones that answer.
pub struct HostDiscovery {
    probe: Arc<dyn ReachabilityProbe>,
    resolver: Arc<dyn NameResolver>,
    probe_timeout: Duration,
    resolve_timeout: Duration,
    concurrency: usize,
    bound: usize,
}

impl HostDiscovery {
    pub fn new(
        probe: Arc<dyn ReachabilityProbe>,
        resolver: Arc<dyn NameResolver>,
        probe_timeout: Duration,
        resolve_timeout: Duration,
        concurrency: usize,
        bound: usize,
    ) -> Self {
        Self {
            probe,
            resolver,
            probe_timeout,
            resolve_timeout,
            concurrency,
            bound,
        }
    }

    /// Probe every candidate. `on_found` gets the 1-based position of each
    /// admitted host the moment it lands in the result set, in position
    /// order; hosts past the bound are dropped without a callback.
    pub async fn discover<I, F>(
        &self,
        candidates: I,
        cancel: &CancellationToken,
        on_found: F,
    ) -> DiscoveryOutcome
    where
        I: IntoIterator<Item = Ipv4Addr>,
        F: Fn(usize, &Host) + Send + Sync + 'static,
    {
        let store = Arc::new(ResultStore::new(self.bound));
        let on_found = Arc::new(on_found);

        info!(probe = self.probe.name(), concurrency = self.concurrency, "starting host discovery");

        let run = fan_out(candidates, self.concurrency, cancel, |addr| {
            let probe = self.probe.clone();
            let resolver = self.resolver.clone();
            let store = store.clone();
            let on_found = on_found.clone();
            let probe_timeout = self.probe_timeout;
            let resolve_timeout = self.resolve_timeout;

            async move {
                if !probe.probe(addr, probe_timeout).await {
                    return;
                }

                let name = timeout(resolve_timeout, resolver.reverse_lookup(addr))
                    .await
                    .ok()
                    .flatten();
                let host = Host::new(addr, name);

                // Announce under the store lock so announcements keep index order.
                let admitted = store.insert_with(host, |position, host| {
                    debug!(%addr, name = %host.display_name, "host is up");
                    on_found(position + 1, host);
                });
                if admitted.is_none() {
                    debug!(%addr, "host result set full, dropping");
                }
            }
        }).await;

        // Every task has been joined, so we hold the only reference.
        let hosts = match Arc::try_unwrap(store) {
            Ok(store) => store.into_inner(),
            Err(store) => store.snapshot(),
        };

        info!(probed = run.launched, found = hosts.len(), cancelled = run.cancelled, "host discovery finished");

        DiscoveryOutcome {
            hosts,
            probed: run.launched,
            cancelled: run.cancelled,
        }
    }
}

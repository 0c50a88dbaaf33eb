use std::fmt;
use std::net::Ipv4Addr;
use ipnet::{Ipv4AddrRange, Ipv4Net};
use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::IpNetwork;
use tracing::debug;

use crate::error::ConfigError;

/// Widest subnet swept by default when the network comes from the interface.
pub const DEFAULT_SWEEP_PREFIX: u8 = 24;

/// The local address and mask the scan is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    interface: Ipv4Net,
}

impl NetworkConfig {
    pub fn new(local_address: Ipv4Addr, subnet_mask: Ipv4Addr) -> Result<Self, ConfigError> {
        let interface = Ipv4Net::with_netmask(local_address, subnet_mask)
            .map_err(|_| ConfigError::InvalidMask(subnet_mask))?;
        Ok(Self { interface })
    }

    /// Parse an operator supplied `ADDRESS/PREFIX`, keeping the host part.
    pub fn from_cidr(cidr: &str) -> Result<Self, ConfigError> {
        let interface: Ipv4Net = cidr.trim().parse()
            .map_err(|_| ConfigError::InvalidCidr(cidr.to_string()))?;
        Ok(Self { interface })
    }

    pub fn local_address(&self) -> Ipv4Addr {
        self.interface.addr()
    }

    pub fn subnet_mask(&self) -> Ipv4Addr {
        self.interface.netmask()
    }

    pub fn network_address(&self) -> Ipv4Addr {
        self.interface.network()
    }

    pub fn prefix_len(&self) -> u8 {
        self.interface.prefix_len()
    }

    pub fn network(&self) -> Ipv4Net {
        self.interface.trunc()
    }

    /// Every usable host address of the subnet, network and broadcast
    /// excluded (a /24 yields offsets 1..=254).
    pub fn candidates(&self) -> Ipv4AddrRange {
        self.network().hosts()
    }

    /// Shrink to the `/prefix` block around the local address. Networks that
    /// are already that narrow (or an impossible prefix) come back unchanged.
    pub fn narrowed_to(&self, prefix: u8) -> NetworkConfig {
        if prefix <= self.prefix_len() {
            return *self;
        }
        Ipv4Net::new(self.local_address(), prefix)
            .map(|interface| Self { interface })
            .unwrap_or(*self)
    }

    pub fn candidate_count(&self) -> usize {
        match self.prefix_len() {
            32 => 1,
            31 => 2,
            prefix => (1usize << (32 - prefix as u32)) - 2,
        }
    }
}

impl fmt::Display for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.network())
    }
}

/// Look up the first active, non-loopback interface carrying an IPv4 address.
pub fn resolve_local_network() -> Result<NetworkConfig, ConfigError> {
    let interfaces = datalink::interfaces();
    debug!(count = interfaces.len(), "enumerated network interfaces");

    select_interface_network(&interfaces).ok_or(ConfigError::NoNetworkInterface)
}

fn select_interface_network(interfaces: &[NetworkInterface]) -> Option<NetworkConfig> {
    interfaces
        .iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .find_map(|iface| {
            iface.ips.iter().find_map(|ip| match ip {
                IpNetwork::V4(v4) => {
                    let config = NetworkConfig::new(v4.ip(), v4.mask()).ok()?;
                    debug!(interface = %iface.name, network = %config, "selected interface");
                    Some(config)
                }
                IpNetwork::V6(_) => None,
            })
        })
}

use std::net::Ipv4Addr;
use thiserror::Error;

/// Failures while working out which network to scan. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no active non-loopback IPv4 network interface found")]
    NoNetworkInterface,
    #[error("subnet mask {0} is not contiguous")]
    InvalidMask(Ipv4Addr),
    #[error("invalid network '{0}', expected ADDRESS/PREFIX (e.g. 192.168.1.10/24)")]
    InvalidCidr(String),
}

/// Operator picked a host that is not in the discovery list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selection {index} is out of range (1-{count})")]
    OutOfRange { index: usize, count: usize },
    #[error("'{0}' is not a host number")]
    NotANumber(String),
}

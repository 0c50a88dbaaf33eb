use serde::{Serialize, Deserialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use chrono::{DateTime, Utc};

/// Display name used when a reverse lookup yields nothing.
pub const UNKNOWN_HOSTNAME: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub address: Ipv4Addr,
    pub display_name: String,
}

impl Host {
    pub fn new(address: Ipv4Addr, display_name: Option<String>) -> Self {
        Self {
            address,
            display_name: display_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub network: String,
    pub local_address: Ipv4Addr,
    pub candidates: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub cancelled: bool,
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortScanReport {
    pub target: Ipv4Addr,
    pub port_range: PortRange,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub cancelled: bool,
    pub attempted: usize,
    pub open_ports: Vec<u16>,
}

impl PortScanReport {
    pub fn has_open_ports(&self) -> bool {
        !self.open_ports.is_empty()
    }
}

/// Inclusive TCP port range; port 0 is never part of it.
/// Only constructible through [`PortRange::new`] or parsing, so `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    pub const ALL: PortRange = PortRange { start: 1, end: u16::MAX };

    pub fn new(start: u16, end: u16) -> anyhow::Result<Self> {
        if start == 0 {
            anyhow::bail!("Port 0 cannot be scanned");
        }
        if start > end {
            anyhow::bail!("Invalid port range: {} > {}", start, end);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromStr for PortRange {
    type Err = anyhow::Error;

    /// Accepts `-` (all ports), `N`, or `START-END`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "-" {
            return Ok(Self::ALL);
        }

        let parse = |part: &str| -> anyhow::Result<u16> {
            part.trim().parse::<u16>()
                .map_err(|_| anyhow::anyhow!("Invalid port: {}", part))
        };

        match s.split_once('-') {
            Some((start, end)) => Self::new(parse(start)?, parse(end)?),
            None => {
                let port = parse(s)?;
                Self::new(port, port)
            }
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Outcome of a single TCP connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
    Error,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortStatus::Open => write!(f, "open"),
            PortStatus::Closed => write!(f, "closed"),
            PortStatus::Filtered => write!(f, "filtered"),
            PortStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_unknown_sentinel() {
        let host = Host::new(Ipv4Addr::new(192, 168, 1, 42), None);
        assert_eq!(host.display_name, "unknown");
        let host = Host::new(Ipv4Addr::new(192, 168, 1, 42), Some(String::new()));
        assert_eq!(host.display_name, UNKNOWN_HOSTNAME);
    }

    #[test]
    fn test_parse_port_ranges() {
        assert_eq!("-".parse::<PortRange>().unwrap(), PortRange::ALL);
        assert_eq!("22".parse::<PortRange>().unwrap(), PortRange::new(22, 22).unwrap());
        let range: PortRange = "1-1024".parse().unwrap();
        assert_eq!(range.len(), 1024);
        assert_eq!(range.to_string(), "1-1024");
        assert_eq!(PortRange::ALL.len(), 65535);
    }

    #[test]
    fn test_range_endpoints_and_len() {
        let single = PortRange::new(u16::MAX, u16::MAX).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!((single.start(), single.end()), (65535, 65535));

        let range: PortRange = " 8000-8002 ".parse().unwrap();
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![8000, 8001, 8002]);
        assert_eq!(range.len(), 3);

        // An inverted range never gets built, so len cannot underflow.
        assert!(PortRange::new(10, 5).is_err());
    }

    #[test]
    fn test_parse_invalid_port_ranges() {
        assert!("100-50".parse::<PortRange>().is_err());
        assert!("0-10".parse::<PortRange>().is_err());
        assert!("abc".parse::<PortRange>().is_err());
        assert!("1-70000".parse::<PortRange>().is_err());
    }

    #[test]
    fn test_port_status_display() {
        assert_eq!(format!("{}", PortStatus::Open), "open");
        assert_eq!(format!("{}", PortStatus::Closed), "closed");
        assert_eq!(format!("{}", PortStatus::Filtered), "filtered");
        assert_eq!(format!("{}", PortStatus::Error), "error");
    }
}

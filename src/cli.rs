use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::scanner::{PortRange, ScanOptions};
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "lanscope")]
#[command(author = "LanScope")]
#[command(version = "0.1.0")]
#[command(about = "Find live hosts on the local subnet, then sweep one of them for open TCP ports", long_about = None)]
pub struct Cli {
    #[arg(short = 'n', long, value_name = "CIDR", help = "Scan this network (e.g. 192.168.1.10/24) instead of the first active interface's")]
    pub network: Option<String>,

    #[arg(long, help = "Sweep the interface's whole subnet even when it is wider than /24")]
    pub full_subnet: bool,

    #[arg(short, long, default_value = "-", help = "Ports to sweep: 22, 1-1024, or - for all ports")]
    pub ports: PortRange,

    #[arg(long, value_name = "MS", default_value_t = 1000, help = "Reachability probe timeout per host")]
    pub timeout: u64,

    #[arg(long, value_name = "MS", default_value_t = 1000, help = "TCP connect timeout per port")]
    pub connect_timeout: u64,

    #[arg(long, value_name = "MS", default_value_t = 2000, help = "Reverse DNS timeout per host")]
    pub resolve_timeout: u64,

    #[arg(long, value_name = "N", default_value_t = 128, help = "Hosts probed in parallel")]
    pub host_concurrency: usize,

    #[arg(long, value_name = "N", default_value_t = 512, help = "Ports probed in parallel")]
    pub port_concurrency: usize,

    #[arg(long, value_name = "N", default_value_t = 256, help = "Stop recording hosts after this many")]
    pub max_hosts: usize,

    #[arg(long, value_name = "N", default_value_t = 128, help = "Stop recording open ports after this many")]
    pub max_open_ports: usize,

    #[arg(short, long, value_name = "N", help = "Host number to sweep, skips the interactive prompt")]
    pub select: Option<String>,

    #[arg(long, help = "Use TCP connect liveness checks even when ICMP is available")]
    pub tcp_ping: bool,

    #[arg(long, help = "Skip reverse DNS lookups")]
    pub no_dns: bool,

    #[arg(short = 'o', long, value_enum, default_value = "human", help = "Output format")]
    pub output_format: OutputFormat,

    #[arg(short = 'f', long, help = "Output file path")]
    pub output_file: Option<PathBuf>,

    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl Cli {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            probe_timeout: Duration::from_millis(self.timeout),
            resolve_timeout: Duration::from_millis(self.resolve_timeout),
            connect_timeout: Duration::from_millis(self.connect_timeout),
            host_concurrency: self.host_concurrency.max(1),
            port_concurrency: self.port_concurrency.max(1),
            host_bound: self.max_hosts,
            port_bound: self.max_open_ports,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    #[value(name = "human", help = "Human-readable output")]
    Human,
    #[value(name = "json", help = "JSON output")]
    Json,
}

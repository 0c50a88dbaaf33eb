pub mod cli;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;
pub mod selection;

pub use error::{ConfigError, SelectionError};
pub use network::{resolve_local_network, NetworkConfig};
pub use scanner::{Host, PortRange, ScanOptions, Scanner};
pub use selection::select;

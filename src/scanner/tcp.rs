use std::io;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use crate::scanner::results::PortStatus;

/// Full TCP connect with a bounded wait. The stream, if any, is dropped
/// before returning so the socket never outlives the probe.
pub async fn connect_scan(target: IpAddr, port: u16, timeout_dur: Duration) -> PortStatus {
    let addr = SocketAddr::new(target, port);

    match timeout(timeout_dur, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            PortStatus::Open
        }
        Ok(Err(e)) => classify_connect_error(&e),
        Err(_) => PortStatus::Filtered,
    }
}

fn classify_connect_error(e: &io::Error) -> PortStatus {
    if is_resource_exhausted(e) {
        return PortStatus::Error;
    }
    match e.kind() {
        // Connection refused is immediate and means port is closed
        io::ErrorKind::ConnectionRefused => PortStatus::Closed,
        // Host/network unreachable, resets and timeouts all look the same to us
        _ => PortStatus::Filtered,
    }
}

/// Errors that mean we could not get a socket at all, as opposed to the
/// target answering (or not).
pub fn is_resource_exhausted(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::AddrNotAvailable {
        return true;
    }
    #[cfg(unix)]
    {
        matches!(
            e.raw_os_error(),
            Some(libc::EMFILE) | Some(libc::ENFILE) | Some(libc::ENOBUFS) | Some(libc::ENOMEM)
        )
    }
    #[cfg(not(unix))]
    {
        false
    }
}

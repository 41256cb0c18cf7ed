//! Single-port TCP connect probe

use super::{PortFinding, PortProber};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Attempt one TCP handshake with `host:port`, bounded by `probe_timeout`.
///
/// Refusal, unreachability and timeout all come back as closed. A completed
/// handshake is closed again immediately.
pub async fn probe(host: IpAddr, port: u16, probe_timeout: Duration) -> PortFinding {
    if port == 0 {
        return PortFinding::closed(port);
    }

    let addr = SocketAddr::new(host, port);
    match timeout(probe_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            PortFinding::open(port)
        }
        Ok(Err(e)) => {
            log::trace!("{} closed: {}", addr, e);
            PortFinding::closed(port)
        }
        Err(_) => {
            log::trace!("{} timed out after {:?}", addr, probe_timeout);
            PortFinding::closed(port)
        }
    }
}

/// TCP connect prober - no privileges required
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectProber;

#[async_trait]
impl PortProber for TcpConnectProber {
    async fn probe(&self, host: IpAddr, port: u16, timeout: Duration) -> PortFinding {
        probe(host, port, timeout).await
    }
}

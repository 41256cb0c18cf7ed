//! Bounded-concurrency scanning engine

use crate::config::ScanConfig;
use crate::error::PortwardError;
use crate::scanner::{PortFinding, PortProber, ScanReport, TcpConnectProber};
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Default number of probes allowed in flight at once
pub const DEFAULT_CONCURRENCY: usize = 50;

/// Default per-probe handshake timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// Main scanning engine
pub struct ScanEngine {
    prober: Arc<dyn PortProber>,
    concurrency: usize,
    timeout: Duration,
    deadline: Option<Duration>,
    notifier: Option<mpsc::UnboundedSender<PortFinding>>,
}

impl ScanEngine {
    /// Create an engine probing with TCP connect
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            prober: Arc::new(TcpConnectProber),
            concurrency,
            timeout,
            deadline: None,
            notifier: None,
        }
    }

    pub fn from_config(config: &ScanConfig) -> crate::Result<Self> {
        config.validate()?;
        let mut engine = Self::new(config.concurrency, config.timeout_duration());
        engine.deadline = config.deadline_duration();
        Ok(engine)
    }

    /// Replace the prober (tests use this to run without a network)
    pub fn with_prober(mut self, prober: Arc<dyn PortProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Abandon probes still outstanding after `deadline`; they count as closed
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Receive each open port as soon as it is confirmed
    pub fn with_notifier(mut self, notifier: mpsc::UnboundedSender<PortFinding>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe every port in `ports` on `target` and wait for all of them.
    ///
    /// Duplicate ports are probed once. Completion order is irrelevant: the
    /// returned report is sorted by port.
    pub async fn scan(&self, target: &str, ports: &[u16]) -> crate::Result<ScanReport> {
        if self.concurrency == 0 {
            return Err(PortwardError::Config(
                "Concurrency limit must be greater than 0".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(PortwardError::Config("Timeout must be greater than 0".to_string()));
        }
        let port_set = validate_ports(ports)?;
        let address = resolve_target(target).await?;

        let start = Instant::now();
        log::info!(
            "Scanning {} ({}): {} ports, concurrency {}, timeout {:?}",
            target,
            address,
            port_set.len(),
            self.concurrency,
            self.timeout
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for &port in &port_set {
            let semaphore = semaphore.clone();
            let prober = self.prober.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return PortFinding::closed(port);
                };
                prober.probe(address, port, timeout).await
            });
        }

        let deadline = self.deadline.map(|d| start + d);
        let mut cancelled = false;
        let mut open = Vec::new();

        loop {
            let joined = match deadline {
                Some(at) if !cancelled => tokio::time::timeout_at(at, tasks.join_next()).await.ok(),
                _ => Some(tasks.join_next().await),
            };
            let Some(next) = joined else {
                log::warn!(
                    "Scan deadline reached with {} probes outstanding; reporting them closed",
                    tasks.len()
                );
                // Finished-but-unjoined probes still yield their result after abort.
                tasks.abort_all();
                cancelled = true;
                continue;
            };

            match next {
                None => break,
                Some(Ok(finding)) if finding.is_open => {
                    log::debug!("Open port {}/tcp on {}", finding.port, address);
                    if let Some(notifier) = &self.notifier {
                        let _ = notifier.send(finding);
                    }
                    open.push(finding);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => log::error!("Probe task failed: {}", e),
            }
        }

        let report = ScanReport::new(
            target.to_string(),
            address,
            open,
            port_set.len(),
            start.elapsed(),
        );
        log::info!(
            "Scan of {} finished in {:?}: {} open of {}",
            target,
            report.duration(),
            report.open_findings().len(),
            report.probed()
        );
        Ok(report)
    }
}

/// Scan `ports` on `target` with TCP connect probes, at most
/// `concurrency_limit` in flight.
pub async fn scan(
    target: &str,
    ports: &[u16],
    concurrency_limit: usize,
    timeout: Duration,
) -> crate::Result<ScanReport> {
    ScanEngine::new(concurrency_limit, timeout).scan(target, ports).await
}

/// Resolve an IP literal or hostname to a single address, preferring IPv4
pub async fn resolve_target(target: &str) -> crate::Result<IpAddr> {
    let target = target.trim();
    if target.is_empty() {
        return Err(PortwardError::InvalidTarget("Target cannot be empty".to_string()));
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((target, 0))
        .await
        .map_err(|e| PortwardError::InvalidTarget(format!("{}: {}", target, e)))?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .map(|a| a.ip())
        .ok_or_else(|| PortwardError::InvalidTarget(format!("{}: no addresses found", target)))
}

fn validate_ports(ports: &[u16]) -> crate::Result<BTreeSet<u16>> {
    if ports.is_empty() {
        return Err(PortwardError::PortRange("No ports specified".to_string()));
    }
    if ports.contains(&0) {
        return Err(PortwardError::PortRange(
            "Port 0 is not a valid TCP port (valid range is 1-65535)".to_string(),
        ));
    }
    Ok(ports.iter().copied().collect())
}

//! Scanner module: port probing, the bounded-concurrency engine and the
//! report it produces

pub mod engine;
pub mod probe;

use crate::intelligence::{lookup_advisory, lookup_risk, AdvisoryEntry, RiskEntry, Severity};
use async_trait::async_trait;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

pub use engine::{resolve_target, scan, ScanEngine};
pub use probe::{probe, TcpConnectProber};

/// Label used for open ports that have no risk entry
pub const UNCLASSIFIED_SERVICE: &str = "unclassified service";

/// Terminal open/closed classification of one probed port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortFinding {
    pub port: u16,
    pub is_open: bool,
}

impl PortFinding {
    pub fn open(port: u16) -> Self {
        Self { port, is_open: true }
    }

    pub fn closed(port: u16) -> Self {
        Self { port, is_open: false }
    }
}

/// Anything that can classify a single host:port as open or closed.
///
/// Implementations must not fail: every error is folded into a closed finding.
#[async_trait]
pub trait PortProber: Send + Sync {
    async fn probe(&self, host: IpAddr, port: u16, timeout: Duration) -> PortFinding;
}

/// An open port joined with its risk classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenFinding {
    pub finding: PortFinding,
    pub risk: Option<&'static RiskEntry>,
}

impl OpenFinding {
    pub fn new(finding: PortFinding) -> Self {
        Self {
            finding,
            risk: lookup_risk(finding.port),
        }
    }

    pub fn port(&self) -> u16 {
        self.finding.port
    }

    pub fn service_label(&self) -> &'static str {
        self.risk.map(|r| r.service_label).unwrap_or(UNCLASSIFIED_SERVICE)
    }

    pub fn severity(&self) -> Option<Severity> {
        self.risk.map(|r| r.severity)
    }

    pub fn advisory(&self) -> Option<&'static AdvisoryEntry> {
        lookup_advisory(self.finding.port)
    }

    /// Whether this finding belongs to the Critical/High tier
    pub fn is_actionable(&self) -> bool {
        self.severity().map(|s| s.is_actionable()).unwrap_or(false)
    }
}

/// Count of open findings per severity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeveritySummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unclassified: usize,
}

/// Result of one scan. Immutable once built; open findings are sorted
/// ascending by port with no duplicates.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    target: String,
    address: IpAddr,
    open_findings: Vec<OpenFinding>,
    probed: usize,
    duration: Duration,
}

impl ScanReport {
    pub(crate) fn new(
        target: String,
        address: IpAddr,
        mut open: Vec<PortFinding>,
        probed: usize,
        duration: Duration,
    ) -> Self {
        open.retain(|f| f.is_open);
        open.sort_unstable_by_key(|f| f.port);
        open.dedup_by_key(|f| f.port);

        Self {
            target,
            address,
            open_findings: open.into_iter().map(OpenFinding::new).collect(),
            probed,
            duration,
        }
    }

    /// Target as supplied by the caller
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Address the target resolved to
    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn open_findings(&self) -> &[OpenFinding] {
        &self.open_findings
    }

    pub fn open_ports(&self) -> Vec<u16> {
        self.open_findings.iter().map(|f| f.port()).collect()
    }

    /// Number of distinct ports probed
    pub fn probed(&self) -> usize {
        self.probed
    }

    pub fn closed(&self) -> usize {
        self.probed.saturating_sub(self.open_findings.len())
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Critical and High findings, in port order
    pub fn actionable(&self) -> impl Iterator<Item = &OpenFinding> {
        self.open_findings.iter().filter(|f| f.is_actionable())
    }

    pub fn summary(&self) -> SeveritySummary {
        let mut summary = SeveritySummary::default();
        for finding in &self.open_findings {
            match finding.severity() {
                Some(Severity::Critical) => summary.critical += 1,
                Some(Severity::High) => summary.high += 1,
                Some(Severity::Medium) => summary.medium += 1,
                Some(Severity::Low) => summary.low += 1,
                None => summary.unclassified += 1,
            }
        }
        summary
    }
}

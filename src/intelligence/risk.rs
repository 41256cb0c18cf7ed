//! Known-risk classification of well-known TCP ports

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Exposure severity, ordered from least to most serious
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Critical and High findings dominate a summary and get remediation
    /// offered; Medium and Low are informational.
    pub fn is_actionable(&self) -> bool {
        *self >= Severity::High
    }

    pub fn name(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static risk classification for one port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskEntry {
    pub port: u16,
    pub service_label: &'static str,
    pub severity: Severity,
    pub note: &'static str,
}

const RISK_TABLE: &[(u16, &str, Severity, &str)] = &[
    (21, "FTP", Severity::High, "Cleartext credentials; anonymous login is frequently left enabled"),
    (22, "SSH", Severity::Medium, "Prime brute-force target; password logins invite credential stuffing"),
    (23, "Telnet", Severity::Critical, "Unencrypted remote shell; credentials travel in plaintext"),
    (25, "SMTP", Severity::Medium, "Open relays are abused for spam and spoofing"),
    (53, "DNS", Severity::Medium, "Open resolvers enable amplification attacks and zone leaks"),
    (80, "HTTP", Severity::Medium, "Unencrypted web traffic; exposes application attack surface"),
    (110, "POP3", Severity::Medium, "Mailbox credentials sent in cleartext"),
    (111, "RPCbind", Severity::High, "Enumerates RPC services and aids NFS exploitation"),
    (135, "MSRPC", Severity::High, "Windows RPC endpoint mapper; historic worm vector"),
    (139, "NetBIOS", Severity::High, "Leaks host and share information; legacy SMB transport"),
    (143, "IMAP", Severity::Medium, "Mailbox credentials sent in cleartext"),
    (443, "HTTPS", Severity::Low, "Encrypted web traffic; risk lies in the application behind it"),
    (445, "SMB", Severity::Critical, "Wormable file sharing (EternalBlue class exploits)"),
    (1433, "MSSQL", Severity::High, "Database reachable from the network; brute-force target"),
    (1521, "Oracle", Severity::High, "Database listener reachable from the network"),
    (2049, "NFS", Severity::High, "Network file shares often exported without authentication"),
    (3306, "MySQL", Severity::High, "Database reachable from the network; brute-force target"),
    (3389, "RDP", Severity::Critical, "Remote desktop exposed; ransomware entry point"),
    (5432, "PostgreSQL", Severity::High, "Database reachable from the network; brute-force target"),
    (5900, "VNC", Severity::Critical, "Remote desktop frequently running with weak or no password"),
    (6379, "Redis", Severity::Critical, "No authentication by default; allows remote code execution"),
    (8080, "HTTP-Alt", Severity::Medium, "Development servers and admin panels commonly live here"),
    (9200, "Elasticsearch", Severity::High, "Unauthenticated REST API can leak or wipe indices"),
    (11211, "Memcached", Severity::High, "Unauthenticated cache; UDP amplification vector"),
    (27017, "MongoDB", Severity::Critical, "Unauthenticated instances are routinely ransomed"),
];

static RISK_DATABASE: Lazy<HashMap<u16, RiskEntry>> = Lazy::new(|| {
    RISK_TABLE
        .iter()
        .map(|&(port, service_label, severity, note)| {
            (port, RiskEntry { port, service_label, severity, note })
        })
        .collect()
});

/// Look up the risk classification of a port.
///
/// `None` means the port is unclassified, not that it is safe.
pub fn lookup_risk(port: u16) -> Option<&'static RiskEntry> {
    RISK_DATABASE.get(&port)
}

/// Every port with a risk entry, ascending
pub fn known_ports() -> Vec<u16> {
    let mut ports: Vec<u16> = RISK_DATABASE.keys().copied().collect();
    ports.sort_unstable();
    ports
}

//! Portward - TCP exposure triage for hosts you control
//!
//! Sweeps a port set with bounded concurrency, annotates open ports with a
//! static risk classification and hardening advice, and drives guided
//! firewall remediation through the host packet-filter tool.

pub mod config;
pub mod error;
pub mod firewall;
pub mod intelligence;
pub mod output;
pub mod ports;
pub mod scanner;

// Re-export commonly used types
pub use config::{FirewallConfig, ScanConfig, Settings};
pub use error::{FirewallError, PortwardError};
pub use firewall::{FirewallController, FirewallState, RemediationAction, Strategy};
pub use intelligence::{lookup_advisory, lookup_risk, Severity};
pub use scanner::{scan, PortFinding, ScanEngine, ScanReport};

pub type Result<T> = std::result::Result<T, PortwardError>;

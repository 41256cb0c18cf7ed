//! Configuration module for portward
//!
//! Core operations take their parameters as arguments; these structures only
//! gather defaults and an optional `~/.portward.toml` for the command line.

use crate::error::PortwardError;
use crate::scanner::engine::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Scan parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Target host or IP to scan
    pub target: String,

    /// Ports to scan; empty means "let the caller pick a default set"
    pub ports: Vec<u16>,

    /// Maximum probes in flight
    pub concurrency: usize,

    /// Per-probe timeout in milliseconds
    pub timeout_ms: u64,

    /// Whole-scan deadline in milliseconds
    pub deadline_ms: Option<u64>,

    /// Print open ports as they are found
    pub notify_open: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: "127.0.0.1".to_string(),
            ports: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            deadline_ms: None,
            notify_open: false,
        }
    }
}

impl ScanConfig {
    pub fn new(target: String) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_deadline(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn deadline_duration(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.trim().is_empty() {
            return Err(PortwardError::InvalidTarget("Target cannot be empty".to_string()));
        }

        if self.concurrency == 0 {
            return Err(PortwardError::Config(
                "Concurrency limit must be greater than 0".to_string(),
            ));
        }

        if self.timeout_ms == 0 {
            return Err(PortwardError::Config("Timeout must be greater than 0".to_string()));
        }

        if self.ports.contains(&0) {
            return Err(PortwardError::PortRange(
                "Port 0 is not a valid TCP port".to_string(),
            ));
        }

        Ok(())
    }
}

/// Packet-filter tool settings feeding the remediation decision table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    /// Packet-filter command-line tool
    pub tool: String,

    /// Protocol suffix appended to rule ports (`22/tcp`)
    pub protocol: String,

    /// Remote shell / administration ports (rate-limited by default)
    pub admin_ports: Vec<u16>,

    /// Web ports expected to stay open
    pub web_ports: Vec<u16>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            tool: "ufw".to_string(),
            protocol: "tcp".to_string(),
            admin_ports: vec![22],
            web_ports: vec![80, 443],
        }
    }
}

/// Everything that can be read from a settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scan: ScanConfig,
    pub firewall: FirewallConfig,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PortwardError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| PortwardError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load `~/.portward.toml` if present, falling back to defaults
    pub fn load_default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let path = home_dir.join(".portward.toml");

        if path.exists() {
            match Self::from_toml_file(&path) {
                Ok(settings) => {
                    log::info!("Loaded config from {}", path.display());
                    return settings;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.concurrency, 50);
        assert_eq!(config.timeout_duration(), Duration::from_millis(200));
        assert!(config.deadline_duration().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(ScanConfig::new(String::new()).validate().is_err());
        assert!(ScanConfig::default().with_concurrency(0).validate().is_err());
        assert!(ScanConfig::default().with_timeout(0).validate().is_err());
        assert!(ScanConfig::default().with_ports(vec![0, 22]).validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [scan]
            concurrency = 8

            [firewall]
            admin_ports = [22, 2222]
            "#,
        )
        .unwrap();

        assert_eq!(settings.scan.concurrency, 8);
        assert_eq!(settings.scan.timeout_ms, 200);
        assert_eq!(settings.firewall.tool, "ufw");
        assert_eq!(settings.firewall.admin_ports, vec![22, 2222]);
        assert_eq!(settings.firewall.web_ports, vec![80, 443]);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        assert!(matches!(
            Settings::from_toml_str("[scan\nconcurrency = "),
            Err(PortwardError::Config(_))
        ));
    }
}

//! Port-set parsing and the default sweep used by the command line

use crate::error::PortwardError;
use crate::intelligence::known_ports;
use std::collections::BTreeSet;

/// Ports 1-1024 plus every port with a risk entry, ascending.
///
/// Database and remote-desktop ports sit above 1024 and would otherwise be
/// missed by a plain low-range sweep.
pub fn default_port_set() -> Vec<u16> {
    let mut ports: BTreeSet<u16> = (1..=1024).collect();
    ports.extend(known_ports());
    ports.into_iter().collect()
}

/// Parse a port specification such as `22,80,8000-8100`.
///
/// The result is sorted and deduplicated.
pub fn parse_port_spec(spec: &str) -> crate::Result<Vec<u16>> {
    let mut ports = BTreeSet::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_port(start)?;
                let end = parse_port(end)?;
                if start > end {
                    return Err(PortwardError::PortRange(format!(
                        "Invalid range {}: start is greater than end",
                        part
                    )));
                }
                ports.extend(start..=end);
            }
            None => {
                ports.insert(parse_port(part)?);
            }
        }
    }

    if ports.is_empty() {
        return Err(PortwardError::PortRange("No ports specified".to_string()));
    }
    Ok(ports.into_iter().collect())
}

fn parse_port(s: &str) -> crate::Result<u16> {
    let s = s.trim();
    match s.parse::<u16>() {
        Ok(0) | Err(_) => Err(PortwardError::PortRange(format!(
            "Invalid port '{}' (valid range is 1-65535)",
            s
        ))),
        Ok(port) => Ok(port),
    }
}

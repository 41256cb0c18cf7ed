//! Static port intelligence: risk classification and hardening advisories.
//!
//! Both tables are built once on first access and never mutated, so they can
//! be read from any number of probe tasks without synchronization.

pub mod advisory;
pub mod risk;

pub use advisory::{lookup_advisory, AdvisoryEntry};
pub use risk::{known_ports, lookup_risk, RiskEntry, Severity};

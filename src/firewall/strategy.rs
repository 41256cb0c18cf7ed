//! Remediation strategy selection
//!
//! Rules are evaluated in order and the first one claiming the port wins;
//! ports no rule claims get the table's fallback strategy.

use crate::config::FirewallConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of firewall action taken for an open port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Throttle repeated connection attempts without closing the port
    RateLimit,
    /// Block the port
    Deny,
    /// Explicitly allow the port
    Allow,
}

impl Strategy {
    /// Rule verb understood by the packet-filter tool
    pub fn verb(&self) -> &'static str {
        match self {
            Strategy::RateLimit => "limit",
            Strategy::Deny => "deny",
            Strategy::Allow => "allow",
        }
    }

    /// Action column shown by the tool's status listing
    pub fn listing_label(&self) -> &'static str {
        match self {
            Strategy::RateLimit => "LIMIT",
            Strategy::Deny => "DENY",
            Strategy::Allow => "ALLOW",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::RateLimit => write!(f, "rate-limit"),
            Strategy::Deny => write!(f, "deny"),
            Strategy::Allow => write!(f, "allow"),
        }
    }
}

/// Operator choice for remote administration ports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminPolicy {
    #[default]
    RateLimit,
    /// Full block. Can cut off the operator's own session.
    Deny,
}

/// What a matching rule decides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fixed(Strategy),
    /// Decided by the operator's [`AdminPolicy`]; denying is destructive
    OperatorChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRule {
    pub name: &'static str,
    pub ports: Vec<u16>,
    pub outcome: Outcome,
}

impl DecisionRule {
    pub fn new(name: &'static str, ports: Vec<u16>, outcome: Outcome) -> Self {
        Self { name, ports, outcome }
    }

    pub fn matches(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }
}

/// Result of evaluating the table for one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub strategy: Strategy,
    /// Name of the rule that matched, `None` for the fallback
    pub rule: Option<&'static str>,
    /// Deny chosen for a port the operator may be connected through
    pub destructive: bool,
}

/// Ordered precedence list of strategy rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionTable {
    rules: Vec<DecisionRule>,
    fallback: Strategy,
}

impl DecisionTable {
    pub fn new(fallback: Strategy) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Append a rule with lower precedence than every existing one
    pub fn with_rule(mut self, rule: DecisionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Admin ports (operator choice), then web ports (allow), else deny
    pub fn from_config(config: &FirewallConfig) -> Self {
        Self::new(Strategy::Deny)
            .with_rule(DecisionRule::new(
                "remote-administration",
                config.admin_ports.clone(),
                Outcome::OperatorChoice,
            ))
            .with_rule(DecisionRule::new(
                "web",
                config.web_ports.clone(),
                Outcome::Fixed(Strategy::Allow),
            ))
    }

    pub fn rules(&self) -> &[DecisionRule] {
        &self.rules
    }

    pub fn decide(&self, port: u16, policy: AdminPolicy) -> Decision {
        let Some(rule) = self.rules.iter().find(|r| r.matches(port)) else {
            return Decision {
                strategy: self.fallback,
                rule: None,
                destructive: false,
            };
        };

        let (strategy, destructive) = match rule.outcome {
            Outcome::Fixed(strategy) => (strategy, false),
            Outcome::OperatorChoice => match policy {
                AdminPolicy::RateLimit => (Strategy::RateLimit, false),
                AdminPolicy::Deny => (Strategy::Deny, true),
            },
        };

        Decision {
            strategy,
            rule: Some(rule.name),
            destructive,
        }
    }
}

impl Default for DecisionTable {
    fn default() -> Self {
        Self::from_config(&FirewallConfig::default())
    }
}

//! Error handling for portward
//!
//! Probe failures never show up here: a refused, unreachable or timed out
//! connection is simply a closed port. What remains are input errors raised
//! before a scan starts and the typed failures of the firewall controller.

use thiserror::Error;

/// Main error type for library operations
#[derive(Debug, Error)]
pub enum PortwardError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Port range error: {0}")]
    PortRange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Firewall(#[from] FirewallError),
}

/// Failures surfaced by the firewall controller.
///
/// Each variant keeps whatever the packet-filter tool printed so the operator
/// can see why it refused. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FirewallError {
    /// Firewall status could not be determined (tool missing, no privilege,
    /// or the status command itself failed). Never means "inactive".
    #[error("cannot query firewall state: {reason}")]
    CannotQuery { reason: String, output: String },

    /// The tool ran and exited non-zero, or could not be started at all.
    #[error("command `{command}` failed{}: {output}", exit_suffix(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },
}

fn exit_suffix(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!(" with exit code {}", code),
        None => String::new(),
    }
}

impl FirewallError {
    /// Captured tool output attached to this failure
    pub fn output(&self) -> &str {
        match self {
            FirewallError::CannotQuery { output, .. } => output,
            FirewallError::CommandFailed { output, .. } => output,
        }
    }
}

//! Firewall controller: state inspection and guided remediation through an
//! external packet-filter tool (ufw command syntax).
//!
//! Every operation is a single attempt with no retry. Operations on one
//! controller are serialized so a status query never races a rule change.

pub mod runner;
pub mod strategy;

use crate::config::FirewallConfig;
use crate::error::FirewallError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use strategy::{AdminPolicy, Decision, DecisionRule, DecisionTable, Outcome, Strategy};

/// Shown before a Deny on an administration port may be confirmed
pub const LOCKOUT_WARNING: &str =
    "Denying this port blocks remote administration and can lock you out of the session you are connected through";

const ACTIVE_STATUS_LINE: &str = "Status: active";

/// Firewall enablement as observed by one status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirewallState {
    pub active: bool,
}

impl fmt::Display for FirewallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.active { "active" } else { "inactive" })
    }
}

/// Controller lifecycle: `Unknown` until the first query, then the result of
/// the most recent query or remediation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FirewallPhase {
    Unknown,
    Inactive,
    Active,
    RuleApplied,
    RuleFailed,
}

impl From<FirewallState> for FirewallPhase {
    fn from(state: FirewallState) -> Self {
        if state.active {
            FirewallPhase::Active
        } else {
            FirewallPhase::Inactive
        }
    }
}

/// A proposed firewall change for one port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationAction {
    pub port: u16,
    pub strategy: Strategy,
    pub command_args: Vec<String>,
    destructive: bool,
}

impl RemediationAction {
    /// Command line as it will be executed, for the operator preview
    pub fn command_line(&self) -> String {
        self.command_args.join(" ")
    }

    /// Lockout warning when this action blocks an administration port
    pub fn warning(&self) -> Option<&'static str> {
        self.destructive.then_some(LOCKOUT_WARNING)
    }

    pub fn is_destructive(&self) -> bool {
        self.destructive
    }

    /// Record the operator's explicit approval. Only confirmed actions can
    /// be applied.
    pub fn confirm(self) -> ConfirmedAction {
        ConfirmedAction(self)
    }
}

/// A [`RemediationAction`] the operator has approved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedAction(RemediationAction);

impl ConfirmedAction {
    pub fn action(&self) -> &RemediationAction {
        &self.0
    }

    pub fn into_inner(self) -> RemediationAction {
        self.0
    }
}

/// Post-apply re-inspection of the firewall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub state: FirewallState,
    /// The tool's rule listing shows this port with the expected action
    pub rule_listed: bool,
}

impl Verification {
    /// Rule is listed and the firewall is enforcing it
    pub fn is_effective(&self) -> bool {
        self.state.active && self.rule_listed
    }
}

/// Outcome of an accepted remediation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    pub action: RemediationAction,
    /// What the tool printed when adding the rule
    pub output: String,
    /// Re-query after the rule was accepted
    pub verification: Result<Verification, FirewallError>,
}

/// Queries and mutates the host packet filter through a [`CommandRunner`]
pub struct FirewallController {
    runner: Arc<dyn CommandRunner>,
    tool: String,
    protocol: String,
    table: DecisionTable,
    phase: Mutex<FirewallPhase>,
}

impl FirewallController {
    /// Controller spawning the configured tool as a child process
    pub fn new(config: &FirewallConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    pub fn with_runner(config: &FirewallConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            tool: config.tool.clone(),
            protocol: config.protocol.clone(),
            table: DecisionTable::from_config(config),
            phase: Mutex::new(FirewallPhase::Unknown),
        }
    }

    /// Replace the strategy decision table
    pub fn with_table(mut self, table: DecisionTable) -> Self {
        self.table = table;
        self
    }

    pub fn table(&self) -> &DecisionTable {
        &self.table
    }

    pub async fn phase(&self) -> FirewallPhase {
        *self.phase.lock().await
    }

    /// Ask the packet filter whether it is enabled.
    ///
    /// Only a first output line of `Status: active` counts as active. A tool
    /// that cannot be started or exits non-zero yields `CannotQuery`.
    pub async fn query_state(&self) -> Result<FirewallState, FirewallError> {
        let mut phase = self.phase.lock().await;
        let state = self.status_locked().await?.0;
        *phase = state.into();
        Ok(state)
    }

    /// Turn the packet filter on. Returns the tool's output.
    ///
    /// The phase is refreshed from a status query after the tool accepts;
    /// if that query fails the phase is left as it was.
    pub async fn enable(&self) -> Result<String, FirewallError> {
        let mut phase = self.phase.lock().await;
        let argv = vec![self.tool.clone(), "--force".to_string(), "enable".to_string()];
        let output = self.run_checked(&argv).await?;

        match self.status_locked().await {
            Ok((state, _)) => *phase = state.into(),
            Err(e) => log::warn!("Firewall enabled but state could not be re-read: {}", e),
        }
        Ok(output)
    }

    /// Strategy for `port` with the default (rate-limit) admin policy
    pub fn select_strategy(&self, port: u16) -> RemediationAction {
        self.select_strategy_with(port, AdminPolicy::default())
    }

    pub fn select_strategy_with(&self, port: u16, policy: AdminPolicy) -> RemediationAction {
        let decision = self.table.decide(port, policy);
        log::debug!(
            "Port {} -> {} (rule: {})",
            port,
            decision.strategy,
            decision.rule.unwrap_or("fallback")
        );

        RemediationAction {
            port,
            strategy: decision.strategy,
            command_args: vec![
                self.tool.clone(),
                decision.strategy.verb().to_string(),
                self.rule_target(port),
            ],
            destructive: decision.destructive,
        }
    }

    /// Execute a confirmed rule change. Success means the tool accepted the
    /// rule (exit status zero), not that traffic is now filtered; follow up
    /// with [`verify`](Self::verify).
    pub async fn apply(&self, confirmed: &ConfirmedAction) -> Result<String, FirewallError> {
        let mut phase = self.phase.lock().await;
        self.apply_locked(confirmed.action(), &mut phase).await
    }

    /// Re-query the tool and check the rule for `action` is listed
    pub async fn verify(&self, action: &RemediationAction) -> Result<Verification, FirewallError> {
        let mut phase = self.phase.lock().await;
        self.verify_locked(action, &mut phase).await
    }

    /// Apply a confirmed action and re-verify under one lock.
    ///
    /// A rejected rule is returned as `CommandFailed`; an accepted rule that
    /// does not show up as enforced comes back `Ok` with an ineffective
    /// [`Verification`].
    pub async fn remediate(&self, confirmed: ConfirmedAction) -> Result<Remediation, FirewallError> {
        let mut phase = self.phase.lock().await;
        let action = confirmed.into_inner();

        match self.apply_locked(&action, &mut phase).await {
            Ok(output) => {
                let verification = self.verify_locked(&action, &mut phase).await;
                Ok(Remediation {
                    action,
                    output,
                    verification,
                })
            }
            Err(e) => {
                if let Ok((state, _)) = self.status_locked().await {
                    *phase = state.into();
                }
                Err(e)
            }
        }
    }

    async fn apply_locked(
        &self,
        action: &RemediationAction,
        phase: &mut FirewallPhase,
    ) -> Result<String, FirewallError> {
        log::info!("Applying {} for port {}: {}", action.strategy, action.port, action.command_line());

        let result = self.run_checked(&action.command_args).await;
        *phase = if result.is_ok() {
            FirewallPhase::RuleApplied
        } else {
            FirewallPhase::RuleFailed
        };
        result
    }

    async fn verify_locked(
        &self,
        action: &RemediationAction,
        phase: &mut FirewallPhase,
    ) -> Result<Verification, FirewallError> {
        let (state, listing) = self.status_locked().await?;
        *phase = state.into();

        let rule_listed = rule_listed(&listing, &self.rule_target(action.port), action.strategy);
        if !rule_listed {
            log::warn!("Rule for port {} not found in firewall listing", action.port);
        }
        Ok(Verification { state, rule_listed })
    }

    async fn status_locked(&self) -> Result<(FirewallState, String), FirewallError> {
        let argv = vec![self.tool.clone(), "status".to_string()];
        log::debug!("Running {}", argv.join(" "));

        let out = self.runner.run(&argv).await.map_err(|e| FirewallError::CannotQuery {
            reason: format!("could not run {}: {}", self.tool, e),
            output: String::new(),
        })?;

        if !out.success() {
            return Err(FirewallError::CannotQuery {
                reason: format!("{} status exited with {:?}", self.tool, out.exit_code),
                output: out.output,
            });
        }

        let active = out.output.lines().next().map(str::trim) == Some(ACTIVE_STATUS_LINE);
        Ok((FirewallState { active }, out.output))
    }

    async fn run_checked(&self, argv: &[String]) -> Result<String, FirewallError> {
        let command = argv.join(" ");
        log::debug!("Running {}", command);

        let out = self.runner.run(argv).await.map_err(|e| FirewallError::CommandFailed {
            command: command.clone(),
            exit_code: None,
            output: e.to_string(),
        })?;

        if out.success() {
            Ok(out.output)
        } else {
            log::warn!("{} exited with {:?}", command, out.exit_code);
            Err(FirewallError::CommandFailed {
                command,
                exit_code: out.exit_code,
                output: out.output,
            })
        }
    }

    fn rule_target(&self, port: u16) -> String {
        format!("{}/{}", port, self.protocol)
    }
}

/// Whether a status listing contains `target` (e.g. `22/tcp`) with the
/// strategy's action label
fn rule_listed(listing: &str, target: &str, strategy: Strategy) -> bool {
    listing.lines().skip(1).any(|line| {
        let mut tokens = line.split_whitespace();
        tokens.next() == Some(target) && tokens.any(|t| t == strategy.listing_label())
    })
}

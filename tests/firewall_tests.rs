//! Firewall controller tests against a scripted packet-filter tool

use async_trait::async_trait;
use portward::{
    config::FirewallConfig,
    firewall::{
        AdminPolicy, CommandOutput, CommandRunner, FirewallController, FirewallPhase, FirewallState,
        Strategy, LOCKOUT_WARNING,
    },
    FirewallError,
};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Reply = Result<CommandOutput, io::ErrorKind>;

/// Answers each command line from a script; unknown commands are "not found"
#[derive(Default)]
struct FakeRunner {
    replies: Mutex<HashMap<String, Vec<Reply>>>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    overlapped: AtomicUsize,
}

impl FakeRunner {
    fn new() -> Self {
        Self::default()
    }

    /// Queue a reply; the last queued reply for a command repeats
    fn on(self, command: &str, exit_code: i32, output: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push(Ok(CommandOutput::new(exit_code, output)));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, argv: &[String]) -> io::Result<CommandOutput> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.fetch_add(1, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let command = argv.join(" ");
        self.calls.lock().unwrap().push(command.clone());
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(&command) {
                Some(queue) if queue.len() > 1 => queue.remove(0),
                Some(queue) => queue[0].clone(),
                None => Err(io::ErrorKind::NotFound),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply.map_err(|kind| io::Error::new(kind, format!("{}: not found", argv[0])))
    }
}

const ACTIVE: &str = "Status: active\n\nTo                         Action      From\n--                         ------      ----\n";
const ACTIVE_WITH_SSH_LIMIT: &str = "Status: active\n\nTo                         Action      From\n--                         ------      ----\n22/tcp                     LIMIT       Anywhere\n";

fn build(runner: FakeRunner) -> (FirewallController, Arc<FakeRunner>) {
    let runner = Arc::new(runner);
    let controller = FirewallController::with_runner(&FirewallConfig::default(), runner.clone());
    (controller, runner)
}

#[tokio::test]
async fn test_phase_starts_unknown() {
    let (controller, runner) = build(FakeRunner::new());
    assert_eq!(controller.phase().await, FirewallPhase::Unknown);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_query_state_active() {
    let (controller, _) = build(FakeRunner::new().on("ufw status", 0, ACTIVE));

    let state = controller.query_state().await.unwrap();
    assert_eq!(state, FirewallState { active: true });
    assert_eq!(controller.phase().await, FirewallPhase::Active);
}

#[tokio::test]
async fn test_query_state_other_first_line_is_inactive() {
    for output in ["Status: inactive\n", "", "Firewall loaded\nStatus: active\n"] {
        let (controller, _) = build(FakeRunner::new().on("ufw status", 0, output));
        let state = controller.query_state().await.unwrap();
        assert!(!state.active, "{:?} must not be treated as active", output);
        assert_eq!(controller.phase().await, FirewallPhase::Inactive);
    }
}

#[tokio::test]
async fn test_query_state_missing_tool_cannot_query() {
    let (controller, _) = build(FakeRunner::new());

    let err = controller.query_state().await.unwrap_err();
    assert!(matches!(err, FirewallError::CannotQuery { .. }));
    assert_eq!(controller.phase().await, FirewallPhase::Unknown);
}

#[tokio::test]
async fn test_query_state_without_privilege_cannot_query() {
    let (controller, _) = build(
        FakeRunner::new().on("ufw status", 1, "ERROR: You need to be root to run this script\n"),
    );

    let err = controller.query_state().await.unwrap_err();
    match err {
        FirewallError::CannotQuery { output, .. } => assert!(output.contains("need to be root")),
        other => panic!("expected CannotQuery, got {:?}", other),
    }
}

#[tokio::test]
async fn test_enable_success_and_failure() {
    let (controller, runner) = build(
        FakeRunner::new().on("ufw --force enable", 0, "Firewall is active and enabled on system startup\n"),
    );
    let output = controller.enable().await.unwrap();
    assert!(output.contains("enabled"));
    assert_eq!(runner.calls(), vec!["ufw --force enable", "ufw status"]);
    assert_eq!(controller.phase().await, FirewallPhase::Unknown);

    let (controller, _) = build(FakeRunner::new().on("ufw --force enable", 1, "ERROR: permission denied\n"));
    assert!(matches!(
        controller.enable().await,
        Err(FirewallError::CommandFailed { exit_code: Some(1), .. })
    ));
}

#[tokio::test]
async fn test_enable_refreshes_phase() {
    let (controller, runner) = build(
        FakeRunner::new()
            .on("ufw status", 0, "Status: inactive\n")
            .on("ufw status", 0, ACTIVE)
            .on("ufw --force enable", 0, "Firewall is active and enabled on system startup\n"),
    );

    assert!(!controller.query_state().await.unwrap().active);
    assert_eq!(controller.phase().await, FirewallPhase::Inactive);

    controller.enable().await.unwrap();
    assert_eq!(controller.phase().await, FirewallPhase::Active);
    assert_eq!(runner.calls(), vec!["ufw status", "ufw --force enable", "ufw status"]);
}

#[tokio::test]
async fn test_failed_enable_keeps_phase() {
    let (controller, runner) = build(
        FakeRunner::new()
            .on("ufw status", 0, "Status: inactive\n")
            .on("ufw --force enable", 1, "ERROR: permission denied\n"),
    );

    controller.query_state().await.unwrap();
    assert!(controller.enable().await.is_err());
    assert_eq!(controller.phase().await, FirewallPhase::Inactive);
    assert_eq!(runner.calls(), vec!["ufw status", "ufw --force enable"]);
}

#[tokio::test]
async fn test_select_strategy_decision_table() {
    let (controller, _) = build(FakeRunner::new());

    let ssh = controller.select_strategy(22);
    assert!(matches!(ssh.strategy, Strategy::RateLimit | Strategy::Deny));
    assert_eq!(ssh.strategy, Strategy::RateLimit);
    assert_eq!(ssh.command_args, vec!["ufw", "limit", "22/tcp"]);

    let ssh_deny = controller.select_strategy_with(22, AdminPolicy::Deny);
    assert_eq!(ssh_deny.strategy, Strategy::Deny);
    assert_eq!(ssh_deny.warning(), Some(LOCKOUT_WARNING));

    assert_eq!(controller.select_strategy(80).strategy, Strategy::Allow);
    assert_eq!(controller.select_strategy(443).strategy, Strategy::Allow);
    assert_eq!(controller.select_strategy(25).strategy, Strategy::Deny);
}

#[tokio::test]
async fn test_apply_nonzero_exit_is_command_failed_with_output() {
    let (controller, runner) = build(
        FakeRunner::new().on("ufw deny 25/tcp", 1, "ERROR: Could not update running firewall\n"),
    );

    let action = controller.select_strategy(25).confirm();
    let err = controller.apply(&action).await.unwrap_err();

    match &err {
        FirewallError::CommandFailed { exit_code, output, .. } => {
            assert_eq!(*exit_code, Some(1));
            assert!(!output.is_empty());
            assert!(output.contains("Could not update"));
        }
        other => panic!("expected CommandFailed, got {:?}", other),
    }
    assert_eq!(controller.phase().await, FirewallPhase::RuleFailed);
    assert_eq!(runner.calls(), vec!["ufw deny 25/tcp"]);
}

#[tokio::test]
async fn test_apply_missing_tool_is_command_failed() {
    let (controller, _) = build(FakeRunner::new());
    let action = controller.select_strategy(3306).confirm();
    assert!(matches!(
        controller.apply(&action).await,
        Err(FirewallError::CommandFailed { exit_code: None, .. })
    ));
}

#[tokio::test]
async fn test_remediate_verifies_listed_rule() {
    let (controller, runner) = build(
        FakeRunner::new()
            .on("ufw limit 22/tcp", 0, "Rule added\nRule added (v6)\n")
            .on("ufw status", 0, ACTIVE_WITH_SSH_LIMIT),
    );

    let remediation = controller
        .remediate(controller.select_strategy(22).confirm())
        .await
        .unwrap();

    assert!(remediation.output.contains("Rule added"));
    let verification = remediation.verification.unwrap();
    assert!(verification.rule_listed);
    assert!(verification.is_effective());
    assert_eq!(controller.phase().await, FirewallPhase::Active);
    assert_eq!(runner.calls(), vec!["ufw limit 22/tcp", "ufw status"]);
}

#[tokio::test]
async fn test_remediate_accepted_but_not_effective() {
    // Tool accepts the rule but the firewall is off
    let (controller, _) = build(
        FakeRunner::new()
            .on("ufw deny 6379/tcp", 0, "Rules updated\n")
            .on("ufw status", 0, "Status: inactive\n"),
    );

    let remediation = controller
        .remediate(controller.select_strategy(6379).confirm())
        .await
        .unwrap();

    let verification = remediation.verification.unwrap();
    assert!(!verification.is_effective());
    assert!(!verification.state.active);
    assert_eq!(controller.phase().await, FirewallPhase::Inactive);
}

#[tokio::test]
async fn test_remediate_failure_is_distinct_and_requeries_state() {
    let (controller, runner) = build(
        FakeRunner::new()
            .on("ufw deny 445/tcp", 1, "ERROR: problem running\n")
            .on("ufw status", 0, ACTIVE),
    );

    let result = controller.remediate(controller.select_strategy(445).confirm()).await;

    assert!(matches!(result, Err(FirewallError::CommandFailed { .. })));
    assert_eq!(controller.phase().await, FirewallPhase::Active);
    assert_eq!(runner.calls(), vec!["ufw deny 445/tcp", "ufw status"]);
}

#[tokio::test]
async fn test_verify_after_apply_uses_fresh_query() {
    let (controller, runner) = build(
        FakeRunner::new()
            .on("ufw status", 0, "Status: inactive\n")
            .on("ufw status", 0, ACTIVE_WITH_SSH_LIMIT)
            .on("ufw limit 22/tcp", 0, "Rule added\n"),
    );

    assert!(!controller.query_state().await.unwrap().active);

    let action = controller.select_strategy(22).confirm();
    controller.apply(&action).await.unwrap();
    assert_eq!(controller.phase().await, FirewallPhase::RuleApplied);

    let verification = controller.verify(action.action()).await.unwrap();
    assert!(verification.is_effective());
    assert_eq!(runner.calls().iter().filter(|c| *c == "ufw status").count(), 2);
}

#[tokio::test]
async fn test_operations_are_serialized() {
    let runner = FakeRunner {
        delay: Duration::from_millis(20),
        ..FakeRunner::default()
    }
    .on("ufw status", 0, ACTIVE)
    .on("ufw deny 25/tcp", 0, "Rule added\n");
    let (controller, runner) = build(runner);
    let controller = Arc::new(controller);

    let action = controller.select_strategy(25).confirm();
    let mut handles = Vec::new();
    for i in 0..6 {
        let controller = controller.clone();
        let action = action.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                controller.query_state().await.map(|_| ())
            } else {
                controller.apply(&action).await.map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(runner.calls().len(), 6);
    assert_eq!(runner.overlapped.load(Ordering::SeqCst), 0);
}

//! Settings file and port specification tests

use portward::{
    config::Settings,
    ports::{default_port_set, parse_port_spec},
    FirewallController, PortwardError, ScanEngine, Strategy,
};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_settings_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[scan]
target = "10.0.0.7"
ports = [22, 3306]
concurrency = 16
timeout_ms = 350
deadline_ms = 5000

[firewall]
tool = "/usr/sbin/ufw"
admin_ports = [22, 2222]
web_ports = [80, 443, 8443]
"#
    )
    .unwrap();

    let settings = Settings::from_toml_file(file.path()).unwrap();
    assert_eq!(settings.scan.target, "10.0.0.7");
    assert_eq!(settings.scan.ports, vec![22, 3306]);
    assert_eq!(settings.scan.timeout_duration(), std::time::Duration::from_millis(350));
    assert_eq!(settings.scan.deadline_ms, Some(5000));

    let engine = ScanEngine::from_config(&settings.scan).unwrap();
    assert_eq!(engine.concurrency(), 16);

    let controller = FirewallController::new(&settings.firewall);
    assert_eq!(controller.select_strategy(2222).strategy, Strategy::RateLimit);
    assert_eq!(controller.select_strategy(8443).strategy, Strategy::Allow);
    assert_eq!(controller.select_strategy(3306).command_line(), "/usr/sbin/ufw deny 3306/tcp");
}

#[test]
fn test_missing_settings_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Settings::from_toml_file(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(PortwardError::Config(_))));
}

#[test]
fn test_invalid_scan_config_rejected_by_engine() {
    let settings = Settings::from_toml_str("[scan]\nconcurrency = 0\n").unwrap();
    assert!(matches!(
        ScanEngine::from_config(&settings.scan),
        Err(PortwardError::Config(_))
    ));
}

#[test]
fn test_port_spec_feeds_scan() {
    let ports = parse_port_spec("443,20-22,3389").unwrap();
    assert_eq!(ports, vec![20, 21, 22, 443, 3389]);

    let defaults = default_port_set();
    assert!(ports.iter().all(|p| defaults.contains(p)));
}

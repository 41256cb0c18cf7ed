use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use std::io::{self, BufRead, Write};
use std::process;

use portward::{
    config::Settings,
    firewall::{AdminPolicy, FirewallController},
    output::{render, render_action_preview, OutputFormat},
    ports::{default_port_set, parse_port_spec},
    scanner::{OpenFinding, ScanEngine, ScanReport},
    FirewallError,
};

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(limit: u64) {
    use rlimit::Resource;

    if Resource::NOFILE.set(limit, limit).is_ok() {
        log::info!("Raised open file limit to {}", limit);
    } else {
        eprintln!("{}", "[!] Failed to set ulimit value.".bright_red());
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_limit: u64) {}

fn cli() -> Command {
    Command::new("portward")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scan a host for exposed TCP services and guide firewall remediation")
        .arg(
            Arg::new("target")
                .value_name("TARGET")
                .help("Target to scan (IP or hostname)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("PORTS")
                .help("Ports to scan, e.g. 22,80,8000-8100 (default: 1-1024 plus known risky ports)"),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("LIMIT")
                .help("Maximum probes in flight")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("MS")
                .help("Per-probe timeout in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("deadline")
                .long("deadline")
                .value_name("MS")
                .help("Abandon the scan after this many milliseconds; unfinished ports count as closed")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the report as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("live")
                .long("live")
                .help("Print open ports as soon as they are found")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("remediate")
                .long("remediate")
                .help("Offer firewall rules for risky open ports (each one asks for confirmation)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ssh-deny")
                .long("ssh-deny")
                .help("Block administration ports instead of rate-limiting them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Settings file (default: ~/.portward.toml)"),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Raise the open file limit to this value")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging")
                .action(ArgAction::SetTrue),
        )
}

fn output_format(matches: &ArgMatches) -> OutputFormat {
    if matches.get_flag("json") {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}

/// Live lines would corrupt a JSON document on stdout, so JSON output
/// suppresses them regardless of flag or settings file.
fn live_notifications(matches: &ArgMatches, from_settings: bool) -> bool {
    let requested = from_settings || matches.get_flag("live");
    if requested && output_format(matches) == OutputFormat::Json {
        log::info!("Live notifications disabled for JSON output");
        return false;
    }
    requested
}

fn print_tool_output(e: &FirewallError) {
    let output = e.output().trim();
    if !output.is_empty() {
        eprintln!("{}", output.dimmed());
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Findings worth offering a rule for: Critical/High plus open admin ports
fn remediation_candidates<'a>(
    report: &'a ScanReport,
    controller: &FirewallController,
) -> Vec<&'a OpenFinding> {
    let admin_ports: Vec<u16> = controller
        .table()
        .rules()
        .iter()
        .filter(|r| r.outcome == portward::firewall::Outcome::OperatorChoice)
        .flat_map(|r| r.ports.iter().copied())
        .collect();

    report
        .open_findings()
        .iter()
        .filter(|f| f.is_actionable() || admin_ports.contains(&f.port()))
        .collect()
}

async fn run_remediation(
    report: &ScanReport,
    controller: &FirewallController,
    policy: AdminPolicy,
) -> anyhow::Result<()> {
    let candidates = remediation_candidates(report, controller);
    if candidates.is_empty() {
        println!("\nNo findings need remediation.");
        return Ok(());
    }

    match controller.query_state().await {
        Ok(state) if state.active => println!("\nFirewall is {}", "active".bright_green()),
        Ok(_) => {
            println!("\nFirewall is {}", "inactive".bright_yellow());
            if confirm("Enable the firewall first?")? {
                match controller.enable().await {
                    Ok(_) => println!("{} Firewall enabled", "[✓]".bright_green()),
                    Err(e) => {
                        eprintln!("{} {}", "[!]".bright_red(), e);
                        print_tool_output(&e);
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("{} {}", "[!]".bright_red(), e);
            print_tool_output(&e);
            eprintln!("Firewall state is unverifiable; skipping remediation.");
            return Ok(());
        }
    }

    for finding in candidates {
        let action = controller.select_strategy_with(finding.port(), policy);
        println!("\n{}", render_action_preview(&action));
        if !confirm("Apply this rule?")? {
            println!("Skipped.");
            continue;
        }

        match controller.remediate(action.confirm()).await {
            Ok(remediation) => match remediation.verification {
                Ok(v) if v.is_effective() => {
                    println!("{} Rule active for port {}", "[✓]".bright_green(), remediation.action.port)
                }
                Ok(v) => println!(
                    "{} Rule accepted but not enforced (firewall {}, rule listed: {})",
                    "[~]".bright_yellow(),
                    v.state,
                    v.rule_listed
                ),
                Err(e) => println!("{} Rule accepted but could not be verified: {}", "[~]".bright_yellow(), e),
            },
            Err(e) => {
                eprintln!("{} Remediation failed: {}", "[!]".bright_red(), e);
                print_tool_output(&e);
            }
        }
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let settings = match matches.get_one::<String>("config") {
        Some(path) => Settings::from_toml_file(path).context("loading settings")?,
        None => Settings::load_default(),
    };

    let mut config = settings.scan.clone();
    if let Some(target) = matches.get_one::<String>("target") {
        config.target = target.clone();
    }
    if let Some(spec) = matches.get_one::<String>("ports") {
        config.ports = parse_port_spec(spec)?;
    }
    if config.ports.is_empty() {
        config.ports = default_port_set();
    }
    if let Some(&c) = matches.get_one::<usize>("concurrency") {
        config.concurrency = c;
    }
    if let Some(&t) = matches.get_one::<u64>("timeout") {
        config.timeout_ms = t;
    }
    if let Some(&d) = matches.get_one::<u64>("deadline") {
        config.deadline_ms = Some(d);
    }
    config.notify_open = live_notifications(&matches, config.notify_open);

    if let Some(&limit) = matches.get_one::<u64>("ulimit") {
        adjust_ulimit_size(limit);
    }

    let mut engine = ScanEngine::from_config(&config)?;
    let live = if config.notify_open {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        engine = engine.with_notifier(tx);
        Some(tokio::spawn(async move {
            while let Some(finding) = rx.recv().await {
                println!("{} {}/tcp", "Open".bright_green(), finding.port);
            }
        }))
    } else {
        None
    };

    let report = engine.scan(&config.target, &config.ports).await?;
    drop(engine);
    if let Some(handle) = live {
        let _ = handle.await;
    }

    println!("{}", render(&report, output_format(&matches))?);

    if matches.get_flag("remediate") {
        let controller = FirewallController::new(&settings.firewall);
        let policy = if matches.get_flag("ssh-deny") { AdminPolicy::Deny } else { AdminPolicy::RateLimit };
        run_remediation(&report, &controller, policy).await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "[!] Error:".bright_red(), e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        cli().try_get_matches_from(args).unwrap()
    }

    #[test]
    fn live_flag_enables_notifications_for_text() {
        let matches = parse(&["portward", "127.0.0.1", "--live"]);
        assert_eq!(output_format(&matches), OutputFormat::Text);
        assert!(live_notifications(&matches, false));
        assert!(!live_notifications(&parse(&["portward", "127.0.0.1"]), false));
    }

    #[test]
    fn json_output_suppresses_live_notifications() {
        let matches = parse(&["portward", "127.0.0.1", "--json", "--live"]);
        assert_eq!(output_format(&matches), OutputFormat::Json);
        assert!(!live_notifications(&matches, false));
        assert!(!live_notifications(&parse(&["portward", "127.0.0.1", "--json"]), true));
    }
}

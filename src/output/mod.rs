//! Report rendering

use crate::firewall::RemediationAction;
use crate::intelligence::Severity;
use crate::scanner::{OpenFinding, ScanReport};
use colored::*;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

pub fn render(report: &ScanReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => render_json(report),
    }
}

#[derive(Serialize)]
struct JsonFinding<'a> {
    port: u16,
    service: &'a str,
    severity: Option<Severity>,
    note: Option<&'a str>,
    advisory: Option<&'a str>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    target: &'a str,
    address: String,
    probed: usize,
    closed: usize,
    duration_ms: u128,
    open: Vec<JsonFinding<'a>>,
}

/// Flat JSON document for machine consumers
pub fn render_json(report: &ScanReport) -> serde_json::Result<String> {
    let doc = JsonReport {
        target: report.target(),
        address: report.address().to_string(),
        probed: report.probed(),
        closed: report.closed(),
        duration_ms: report.duration().as_millis(),
        open: report
            .open_findings()
            .iter()
            .map(|f| JsonFinding {
                port: f.port(),
                service: f.service_label(),
                severity: f.severity(),
                note: f.risk.map(|r| r.note),
                advisory: f.advisory().map(|a| a.guidance),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&doc)
}

fn colored_severity(severity: Option<Severity>) -> ColoredString {
    match severity {
        Some(Severity::Critical) => "CRITICAL".bright_red().bold(),
        Some(Severity::High) => "HIGH".red(),
        Some(Severity::Medium) => "MEDIUM".yellow(),
        Some(Severity::Low) => "LOW".green(),
        None => "-".dimmed(),
    }
}

fn render_finding(out: &mut String, finding: &OpenFinding) {
    let line = format!(
        "{:<9} {:<14} {:<9}",
        format!("{}/tcp", finding.port()),
        finding.service_label(),
        colored_severity(finding.severity())
    );
    out.push_str(&line);
    if let Some(risk) = finding.risk {
        out.push_str(&format!(" {}", risk.note));
    }
    out.push('\n');
    if finding.is_actionable() {
        if let Some(advisory) = finding.advisory() {
            out.push_str(&format!("          {} {}\n", "↳".bright_blue(), advisory.guidance));
        }
    }
}

/// Human-readable report, Critical/High findings first
pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nScan report for {} ({})\n",
        report.target().bright_cyan(),
        report.address()
    ));
    out.push_str(&format!(
        "{} ports probed in {:.2}s, {} open, {} closed\n\n",
        report.probed(),
        report.duration().as_secs_f64(),
        report.open_findings().len().to_string().bright_green(),
        report.closed()
    ));

    if report.open_findings().is_empty() {
        out.push_str("No open ports found.\n");
        return out;
    }

    out.push_str(&format!("{:<9} {:<14} {:<9} NOTE\n", "PORT", "SERVICE", "SEVERITY"));

    let (actionable, informational): (Vec<&OpenFinding>, Vec<&OpenFinding>) =
        report.open_findings().iter().partition(|f| f.is_actionable());
    for finding in actionable.into_iter().chain(informational) {
        render_finding(&mut out, finding);
    }

    let summary = report.summary();
    out.push_str(&format!(
        "\n{} critical, {} high, {} medium, {} low, {} unclassified\n",
        summary.critical, summary.high, summary.medium, summary.low, summary.unclassified
    ));
    out
}

/// Preview shown to the operator before asking for confirmation
pub fn render_action_preview(action: &RemediationAction) -> String {
    let mut out = format!(
        "Port {}/tcp: {} via `{}`",
        action.port,
        action.strategy.to_string().bright_cyan(),
        action.command_line()
    );
    if let Some(warning) = action.warning() {
        out.push_str(&format!("\n{} {}", "[!] WARNING:".bright_red().bold(), warning));
    }
    out
}

// SPDX-License-Identifier: MIT
//! doctor — pre-flight checks for `provisiond check`.
//!
//! Runs the host ground-truth probes for every prerequisite plus the
//! disk-space requirement and renders a pass/fail table. Self-contained: no
//! coordinator or backend required.

use std::path::Path;

use crate::config::ProvisionConfig;
use crate::host;
use crate::prereq::{CheckResult, CheckStatus, PrerequisiteKind};

/// The result of a single pre-flight check.
pub struct PreflightResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Run all pre-flight checks and return a list of results.
pub fn run_preflight(config: &ProvisionConfig) -> Vec<PreflightResult> {
    let mut results: Vec<PreflightResult> = PrerequisiteKind::ALL
        .iter()
        .map(|kind| {
            let check = host::probe_prerequisite(*kind, config);
            PreflightResult {
                name: kind.label(),
                passed: check.is_installed(),
                detail: describe(&check),
            }
        })
        .collect();

    let disk = host::disk_space(Path::new("/"), config.required_disk_gb);
    results.push(PreflightResult {
        name: "Disk space",
        passed: disk.sufficient,
        detail: if disk.sufficient {
            format!("{:.1} GB free", disk.available_gb)
        } else {
            format!(
                "low disk space: {:.1} GB free, {:.1} GB required",
                disk.available_gb, disk.required_gb
            )
        },
    });

    results
}

fn describe(check: &CheckResult) -> String {
    match check.status {
        CheckStatus::Installed => match &check.version {
            Some(v) => format!("installed (v{v})"),
            None => "installed".to_string(),
        },
        CheckStatus::NotInstalled => "not found".to_string(),
        CheckStatus::NeedsConfig => check
            .message
            .clone()
            .unwrap_or_else(|| "needs configuration".to_string()),
    }
}

// ─── Output ──────────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print a formatted table of check results to stdout.
pub fn print_preflight_results(results: &[PreflightResult]) {
    println!();
    println!("{BOLD}provisiond check — prerequisite status{RESET}");
    println!("{}", "─".repeat(60));

    for r in results {
        let (symbol, color) = if r.passed { ("✓", GREEN) } else { ("✗", RED) };
        println!("  {color}{symbol}{RESET}  {:<20}  {}", r.name, r.detail);
    }

    println!("{}", "─".repeat(60));

    let missing = results.iter().filter(|r| !r.passed).count();
    if missing == 0 {
        println!("{GREEN}All prerequisites are ready.{RESET}");
    } else {
        println!("{RED}{missing} prerequisite(s) need attention.{RESET}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_formats_each_status() {
        assert_eq!(
            describe(&CheckResult::installed(Some("1.2.3".into()))),
            "installed (v1.2.3)"
        );
        assert_eq!(describe(&CheckResult::installed(None)), "installed");
        assert_eq!(describe(&CheckResult::not_installed()), "not found");
        assert_eq!(
            describe(&CheckResult::needs_config("not signed in")),
            "not signed in"
        );
    }

    #[test]
    fn preflight_covers_every_prerequisite_plus_disk() {
        let config = ProvisionConfig::default();
        let results = run_preflight(&config);
        assert_eq!(results.len(), PrerequisiteKind::ALL.len() + 1);
        assert!(results.iter().any(|r| r.name == "Disk space"));
    }
}

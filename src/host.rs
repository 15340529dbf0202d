// SPDX-License-Identifier: MIT
//! Host ground-truth checks.
//!
//! The concrete probes behind `provisiond check` — and the functions a real
//! installer backend delegates its `probe_*` operations to. Everything here
//! is a pure read of the machine: subprocess `--version` invocations,
//! auth-status output matching, and a statvfs disk-space measurement. No
//! state, no side effects.

use std::path::Path;
use std::process::Command;

use semver::Version;
use tracing::debug;

use crate::config::ProvisionConfig;
use crate::prereq::{CheckResult, CheckStatus, DiskSpaceInfo, PrerequisiteKind, StatusSnapshot};

// ─── Tool checks ─────────────────────────────────────────────────────────────

/// Check that `command` exists and runs, capturing its reported version from
/// the first output line.
pub fn check_tool(command: &str, args: &[&str]) -> CheckResult {
    match Command::new(command).args(args).output() {
        Ok(out) if out.status.success() => {
            let first_line = String::from_utf8_lossy(&out.stdout)
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            CheckResult::installed(extract_version(&first_line))
        }
        Ok(_) => {
            // Present on PATH but exited nonzero — broken enough to reinstall.
            CheckResult::not_installed()
        }
        Err(e) => {
            debug!(command, err = %e, "tool probe failed to spawn");
            CheckResult::not_installed()
        }
    }
}

/// Like [`check_tool`], additionally enforcing a minimum version: an older
/// tool reports `NeedsConfig` with an explanatory message.
pub fn check_tool_with_min(command: &str, args: &[&str], minimum: Option<&str>) -> CheckResult {
    let result = check_tool(command, args);
    let (Some(min), Some(found)) = (minimum, result.version.as_deref()) else {
        return result;
    };
    match meets_minimum(found, min) {
        Some(true) | None => result,
        Some(false) => CheckResult {
            status: CheckStatus::NeedsConfig,
            message: Some(format!("version {found} is older than required {min}")),
            version: result.version,
        },
    }
}

/// Check whether the agent CLI is signed in, via `<agent> auth status`.
///
/// The CLI prints "Logged in …" when authenticated; "not logged in" when it
/// is not. A missing CLI reports `NotInstalled` so the gate blocks the
/// sign-in step on the CLI install instead.
pub fn check_agent_auth(agent_command: &str) -> CheckResult {
    match Command::new(agent_command).args(["auth", "status"]).output() {
        Ok(out) => {
            let stdout = String::from_utf8_lossy(&out.stdout).to_lowercase();
            let stderr = String::from_utf8_lossy(&out.stderr).to_lowercase();
            let combined = format!("{stdout}{stderr}");
            let authenticated =
                combined.contains("logged in") && !combined.contains("not logged in");
            if authenticated {
                CheckResult::installed(None)
            } else {
                CheckResult::needs_config(format!(
                    "not signed in — run `{agent_command} auth login`"
                ))
            }
        }
        Err(_) => CheckResult::not_installed(),
    }
}

/// Probe one prerequisite using the configured commands.
pub fn probe_prerequisite(kind: PrerequisiteKind, config: &ProvisionConfig) -> CheckResult {
    let cmds = &config.commands;
    match kind {
        PrerequisiteKind::Toolchain => check_tool(&cmds.toolchain, &["--version"]),
        PrerequisiteKind::PackageManager => check_tool(&cmds.package_manager, &["--version"]),
        PrerequisiteKind::Runtime => check_tool_with_min(
            &cmds.runtime,
            &["--version"],
            config.min_runtime_version.as_deref(),
        ),
        PrerequisiteKind::AgentCli => check_tool(&cmds.agent, &["--version"]),
        PrerequisiteKind::AgentAuth => check_agent_auth(&cmds.agent),
    }
}

/// Probe every prerequisite.
pub fn probe_all(config: &ProvisionConfig) -> StatusSnapshot {
    StatusSnapshot {
        toolchain: probe_prerequisite(PrerequisiteKind::Toolchain, config),
        package_manager: probe_prerequisite(PrerequisiteKind::PackageManager, config),
        runtime: probe_prerequisite(PrerequisiteKind::Runtime, config),
        agent_cli: probe_prerequisite(PrerequisiteKind::AgentCli, config),
        agent_auth: probe_prerequisite(PrerequisiteKind::AgentAuth, config),
    }
}

// ─── Disk space ──────────────────────────────────────────────────────────────

/// Measure free space on the filesystem containing `path` against the
/// configured requirement. On platforms where the measurement is
/// unavailable the result is reported sufficient — the backend's own
/// download will surface a real shortage.
pub fn disk_space(path: &Path, required_gb: f64) -> DiskSpaceInfo {
    match available_disk_bytes(path) {
        Some(bytes) => DiskSpaceInfo::new(bytes as f64 / 1e9, required_gb),
        None => DiskSpaceInfo {
            available_gb: 0.0,
            required_gb,
            sufficient: true,
        },
    }
}

/// Return available bytes on the filesystem containing `path`.
fn available_disk_bytes(path: &Path) -> Option<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        let path_cstr = CString::new(path.to_str().unwrap_or("/").as_bytes()).ok()?;
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::statvfs(path_cstr.as_ptr(), &mut stat) };
        if ret == 0 {
            // f_bavail = blocks available to unprivileged user
            // f_frsize = fundamental file system block size
            Some(stat.f_bavail as u64 * stat.f_frsize)
        } else {
            None
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

// ─── Version parsing ─────────────────────────────────────────────────────────

/// Pull the first version-looking token out of a `--version` line
/// (e.g. `"node v20.11.1"` → `"20.11.1"`).
pub fn extract_version(line: &str) -> Option<String> {
    line.split_whitespace()
        .map(|tok| tok.trim_start_matches('v'))
        .find(|tok| {
            tok.contains('.')
                && tok
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
                && tok.chars().next().is_some_and(|c| c.is_ascii_digit())
        })
        .map(|s| s.trim_end_matches('.').to_string())
}

/// Compare a probed version against a minimum. `None` when either side does
/// not parse — an unparseable version is never treated as too old.
pub fn meets_minimum(found: &str, minimum: &str) -> Option<bool> {
    let found = parse_semverish(found)?;
    let minimum = parse_semverish(minimum)?;
    Some(found >= minimum)
}

/// Lenient semver parse: pads missing components so `"20.1"` and `"20"`
/// still compare.
fn parse_semverish(s: &str) -> Option<Version> {
    let s = s.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }
    let dots = s.chars().filter(|c| *c == '.').count();
    let padded = match dots {
        0 => format!("{s}.0.0"),
        1 => format!("{s}.0"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

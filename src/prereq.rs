//! Prerequisite catalogue — the tools provisiond knows how to verify and
//! sequence, plus the ground-truth check/permission/disk types shared by the
//! probe, gate, and coordinator.

use serde::{Deserialize, Serialize};

// ─── Prerequisite kinds ──────────────────────────────────────────────────────

/// One external tool or credential required before the host application's
/// main functionality is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteKind {
    /// Compiler/build toolchain (e.g. the platform's C toolchain).
    Toolchain,
    /// System package manager — only needed to install the other tools.
    PackageManager,
    /// Language runtime the agent CLI runs on.
    Runtime,
    /// The command-line AI agent itself.
    AgentCli,
    /// The agent CLI's sign-in credential.
    AgentAuth,
}

impl PrerequisiteKind {
    /// All kinds in canonical install order.
    pub const ALL: [PrerequisiteKind; 5] = [
        PrerequisiteKind::Toolchain,
        PrerequisiteKind::PackageManager,
        PrerequisiteKind::Runtime,
        PrerequisiteKind::AgentCli,
        PrerequisiteKind::AgentAuth,
    ];

    /// Stable identifier used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrerequisiteKind::Toolchain => "toolchain",
            PrerequisiteKind::PackageManager => "package_manager",
            PrerequisiteKind::Runtime => "runtime",
            PrerequisiteKind::AgentCli => "agent_cli",
            PrerequisiteKind::AgentAuth => "agent_auth",
        }
    }

    /// Human-readable label for UI copy and the `check` table.
    pub fn label(&self) -> &'static str {
        match self {
            PrerequisiteKind::Toolchain => "Build toolchain",
            PrerequisiteKind::PackageManager => "Package manager",
            PrerequisiteKind::Runtime => "Language runtime",
            PrerequisiteKind::AgentCli => "Agent CLI",
            PrerequisiteKind::AgentAuth => "Agent sign-in",
        }
    }

    /// Install-time dependencies: steps that must be `Installed` before this
    /// one can be attempted, and that the coordinator will install first
    /// (serially) when unmet.
    ///
    /// `AgentAuth` deliberately has no install dependencies — the gate denies
    /// it outright until the CLI probe reports installed, rather than
    /// auto-installing the CLI as a side effect of a sign-in request.
    pub fn install_dependencies(&self) -> &'static [PrerequisiteKind] {
        match self {
            PrerequisiteKind::Toolchain => &[],
            PrerequisiteKind::PackageManager => &[PrerequisiteKind::Toolchain],
            PrerequisiteKind::Runtime => &[PrerequisiteKind::PackageManager],
            PrerequisiteKind::AgentCli => {
                &[PrerequisiteKind::PackageManager, PrerequisiteKind::Runtime]
            }
            PrerequisiteKind::AgentAuth => &[],
        }
    }

    /// Prerequisites that must already report `Installed` for the gate to
    /// allow this step at all (never auto-installed on its behalf).
    pub fn gate_dependencies(&self) -> &'static [PrerequisiteKind] {
        match self {
            PrerequisiteKind::AgentAuth => &[PrerequisiteKind::AgentCli],
            _ => &[],
        }
    }

    /// Whether the platform action behind this step needs the one-time
    /// elevated-access grant before it may start.
    pub fn requires_elevated_access(&self) -> bool {
        matches!(
            self,
            PrerequisiteKind::Toolchain | PrerequisiteKind::PackageManager
        )
    }

    /// Whether this step drives UI automation and therefore needs the
    /// accessibility-style grant.
    pub fn requires_accessibility(&self) -> bool {
        matches!(self, PrerequisiteKind::AgentAuth)
    }
}

impl std::fmt::Display for PrerequisiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Check results ───────────────────────────────────────────────────────────

/// Ground-truth installed state of one prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Installed,
    NotInstalled,
    /// Present but unusable as-is (e.g. runtime older than the configured
    /// minimum, or CLI installed but not signed in).
    NeedsConfig,
}

/// Result of probing one prerequisite. Produced only by probes — the
/// orchestrator re-derives it from ground truth and never synthesizes it
/// from a session's reported success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    pub fn installed(version: Option<String>) -> Self {
        Self {
            status: CheckStatus::Installed,
            version,
            message: None,
        }
    }

    pub fn not_installed() -> Self {
        Self {
            status: CheckStatus::NotInstalled,
            version: None,
            message: None,
        }
    }

    pub fn needs_config(message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::NeedsConfig,
            version: None,
            message: Some(message.into()),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.status == CheckStatus::Installed
    }
}

/// One `CheckResult` per prerequisite, as returned by `probe_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub toolchain: CheckResult,
    pub package_manager: CheckResult,
    pub runtime: CheckResult,
    pub agent_cli: CheckResult,
    pub agent_auth: CheckResult,
}

impl StatusSnapshot {
    /// A snapshot with every prerequisite `NotInstalled` — the state of a
    /// fresh machine.
    pub fn all_missing() -> Self {
        Self {
            toolchain: CheckResult::not_installed(),
            package_manager: CheckResult::not_installed(),
            runtime: CheckResult::not_installed(),
            agent_cli: CheckResult::not_installed(),
            agent_auth: CheckResult::not_installed(),
        }
    }

    pub fn get(&self, kind: PrerequisiteKind) -> &CheckResult {
        match kind {
            PrerequisiteKind::Toolchain => &self.toolchain,
            PrerequisiteKind::PackageManager => &self.package_manager,
            PrerequisiteKind::Runtime => &self.runtime,
            PrerequisiteKind::AgentCli => &self.agent_cli,
            PrerequisiteKind::AgentAuth => &self.agent_auth,
        }
    }

    pub fn set(&mut self, kind: PrerequisiteKind, result: CheckResult) {
        match kind {
            PrerequisiteKind::Toolchain => self.toolchain = result,
            PrerequisiteKind::PackageManager => self.package_manager = result,
            PrerequisiteKind::Runtime => self.runtime = result,
            PrerequisiteKind::AgentCli => self.agent_cli = result,
            PrerequisiteKind::AgentAuth => self.agent_auth = result,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrerequisiteKind, &CheckResult)> {
        PrerequisiteKind::ALL.iter().map(move |k| (*k, self.get(*k)))
    }
}

// ─── Permissions & disk ──────────────────────────────────────────────────────

/// OS permission grants relevant to install steps. Mutated only by explicit
/// user-granting actions observed through probing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub elevated_access_granted: bool,
    pub accessibility_granted: bool,
}

/// Free-space measurement against the configured requirement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSpaceInfo {
    pub available_gb: f64,
    pub required_gb: f64,
    pub sufficient: bool,
}

impl DiskSpaceInfo {
    pub fn new(available_gb: f64, required_gb: f64) -> Self {
        Self {
            available_gb,
            required_gb,
            sufficient: available_gb >= required_gb,
        }
    }
}

// ─── Dependency resolution ───────────────────────────────────────────────────

/// Resolve the ordered serial chain for `step`: every transitive install
/// dependency that the snapshot reports unmet, in dependency order, followed
/// by `step` itself.
pub fn install_chain(step: PrerequisiteKind, snapshot: &StatusSnapshot) -> Vec<PrerequisiteKind> {
    let mut chain = Vec::new();
    collect_unmet(step, snapshot, &mut chain);
    chain.push(step);
    chain
}

fn collect_unmet(
    step: PrerequisiteKind,
    snapshot: &StatusSnapshot,
    out: &mut Vec<PrerequisiteKind>,
) {
    for dep in step.install_dependencies() {
        collect_unmet(*dep, snapshot, out);
        if !snapshot.get(*dep).is_installed() && !out.contains(dep) {
            out.push(*dep);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_for_met_dependencies_is_just_the_step() {
        let mut snap = StatusSnapshot::all_missing();
        snap.set(
            PrerequisiteKind::PackageManager,
            CheckResult::installed(None),
        );
        snap.set(PrerequisiteKind::Runtime, CheckResult::installed(None));
        assert_eq!(
            install_chain(PrerequisiteKind::AgentCli, &snap),
            vec![PrerequisiteKind::AgentCli]
        );
    }

    #[test]
    fn chain_orders_transitive_dependencies() {
        let snap = StatusSnapshot::all_missing();
        assert_eq!(
            install_chain(PrerequisiteKind::AgentCli, &snap),
            vec![
                PrerequisiteKind::Toolchain,
                PrerequisiteKind::PackageManager,
                PrerequisiteKind::Runtime,
                PrerequisiteKind::AgentCli,
            ]
        );
    }

    #[test]
    fn chain_skips_installed_prefix() {
        let mut snap = StatusSnapshot::all_missing();
        snap.set(PrerequisiteKind::Toolchain, CheckResult::installed(None));
        snap.set(
            PrerequisiteKind::PackageManager,
            CheckResult::installed(None),
        );
        assert_eq!(
            install_chain(PrerequisiteKind::AgentCli, &snap),
            vec![PrerequisiteKind::Runtime, PrerequisiteKind::AgentCli]
        );
    }

    #[test]
    fn auth_has_no_install_chain() {
        // Sign-in is gated on the CLI, never auto-installs it.
        let snap = StatusSnapshot::all_missing();
        assert_eq!(
            install_chain(PrerequisiteKind::AgentAuth, &snap),
            vec![PrerequisiteKind::AgentAuth]
        );
    }

    #[test]
    fn needs_config_counts_as_unmet() {
        let mut snap = StatusSnapshot::all_missing();
        snap.set(PrerequisiteKind::Toolchain, CheckResult::installed(None));
        snap.set(
            PrerequisiteKind::PackageManager,
            CheckResult::installed(None),
        );
        snap.set(
            PrerequisiteKind::Runtime,
            CheckResult::needs_config("runtime 16.0.0 is older than required 18.0.0"),
        );
        assert_eq!(
            install_chain(PrerequisiteKind::AgentCli, &snap),
            vec![PrerequisiteKind::Runtime, PrerequisiteKind::AgentCli]
        );
    }

    #[test]
    fn serde_tags_are_snake_case() {
        let json = serde_json::to_string(&PrerequisiteKind::AgentCli).unwrap();
        assert_eq!(json, "\"agent_cli\"");
    }
}

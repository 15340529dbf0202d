//! Configuration — TOML file with serde defaults and `PROVISIOND_*`
//! environment overrides. A missing or unparseable file logs a warning and
//! falls back to defaults; configuration problems never stop the process.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::prereq::PrerequisiteKind;

const DEFAULT_STEP_TIMEOUT_SECS: u64 = 600;
const DEFAULT_TOOLCHAIN_TIMEOUT_SECS: u64 = 900;
const DEFAULT_SETTLE_RECHECK_DELAY_MS: u64 = 1500;
const DEFAULT_REQUIRED_DISK_GB: f64 = 2.0;
const DEFAULT_EVENT_CAPACITY: usize = 1024;

// ─── Probe commands ──────────────────────────────────────────────────────────

/// Commands the host probes run to establish ground truth (`[commands]` in
/// config.toml). Overridable mainly for tests and unusual PATH setups.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Build toolchain compiler driver.
    pub toolchain: String,
    /// System package manager.
    pub package_manager: String,
    /// Language runtime the agent CLI needs.
    pub runtime: String,
    /// The agent CLI binary; also used for the auth-status probe.
    pub agent: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            toolchain: "cc".to_string(),
            package_manager: "brew".to_string(),
            runtime: "node".to_string(),
            agent: "claude".to_string(),
        }
    }
}

// ─── Top-level config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Advisory timeout for most install steps, in seconds. On expiry the
    /// session reports "taking longer than expected" and keeps waiting —
    /// it is never auto-failed.
    pub step_timeout_secs: u64,
    /// Advisory timeout for the toolchain step — toolchain downloads
    /// legitimately run past the default.
    pub toolchain_timeout_secs: u64,
    /// Delay between a session settling and the ground-truth recheck, in
    /// milliseconds. Hides OS/filesystem propagation latency.
    pub settle_recheck_delay_ms: u64,
    /// Free disk space required before any install may start, in GB.
    pub required_disk_gb: f64,
    /// Event bus buffer capacity.
    pub event_capacity: usize,
    /// Minimum acceptable runtime version; an older probe result reports
    /// `needs_config`. None disables the check.
    pub min_runtime_version: Option<String>,
    pub commands: CommandsConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            toolchain_timeout_secs: DEFAULT_TOOLCHAIN_TIMEOUT_SECS,
            settle_recheck_delay_ms: DEFAULT_SETTLE_RECHECK_DELAY_MS,
            required_disk_gb: DEFAULT_REQUIRED_DISK_GB,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            min_runtime_version: None,
            commands: CommandsConfig::default(),
        }
    }
}

impl ProvisionConfig {
    /// Load from `path` (when given), then apply environment overrides.
    /// Unreadable or invalid files warn and fall back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = match path {
            Some(p) => match std::fs::read_to_string(p) {
                Ok(raw) => match toml::from_str::<ProvisionConfig>(&raw) {
                    Ok(c) => {
                        info!(path = %p.display(), "loaded config file");
                        c
                    }
                    Err(e) => {
                        warn!(path = %p.display(), err = %e, "invalid config file — using defaults");
                        ProvisionConfig::default()
                    }
                },
                Err(e) => {
                    warn!(path = %p.display(), err = %e, "cannot read config file — using defaults");
                    ProvisionConfig::default()
                }
            },
            None => ProvisionConfig::default(),
        };
        config.apply_env();
        config
    }

    /// Environment overrides take precedence over the file.
    fn apply_env(&mut self) {
        if let Some(v) = env_parse::<u64>("PROVISIOND_STEP_TIMEOUT_SECS") {
            self.step_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u64>("PROVISIOND_TOOLCHAIN_TIMEOUT_SECS") {
            self.toolchain_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u64>("PROVISIOND_SETTLE_RECHECK_DELAY_MS") {
            self.settle_recheck_delay_ms = v;
        }
        if let Some(v) = env_parse::<f64>("PROVISIOND_REQUIRED_DISK_GB") {
            self.required_disk_gb = v;
        }
        if let Ok(v) = std::env::var("PROVISIOND_MIN_RUNTIME_VERSION") {
            if !v.is_empty() {
                self.min_runtime_version = Some(v);
            }
        }
        if let Ok(v) = std::env::var("PROVISIOND_AGENT_CMD") {
            if !v.is_empty() {
                self.commands.agent = v;
            }
        }
    }

    /// Advisory timeout for one step.
    pub fn timeout_for(&self, step: PrerequisiteKind) -> Duration {
        match step {
            PrerequisiteKind::Toolchain => Duration::from_secs(self.toolchain_timeout_secs),
            _ => Duration::from_secs(self.step_timeout_secs),
        }
    }

    pub fn settle_recheck_delay(&self) -> Duration {
        Duration::from_millis(self.settle_recheck_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

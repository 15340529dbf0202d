//! Shared test scaffolding: a scripted installer backend that emits a
//! configurable event sequence per step and records how it was driven.
//!
//! Each integration-test binary uses a different slice of this module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use provisiond::{
    CheckResult, DiskSpaceInfo, EventBus, InstallEvent, InstallerBackend, PermissionStatus,
    PrerequisiteKind, ProvisionConfig, StatusSnapshot,
};

/// Delay between scripted events — long enough for tests to observe
/// intermediate stages, short enough to keep the suite fast.
pub const PACE: Duration = Duration::from_millis(15);

/// What the backend does when a step's install operation is invoked.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit `start`, each output line, then `done(success)`. On success the
    /// backend's own probe state flips to installed — simulating ground
    /// truth changing underneath.
    Emit {
        lines: Vec<&'static str>,
        success: bool,
    },
    /// Emit `start` then a terminal `error` event. No `done` follows.
    Fail(&'static str),
    /// Emit `start` and then nothing — the install hangs until cancelled.
    Hang,
    /// The invocation itself fails synchronously.
    RefuseToStart,
}

pub struct ScriptedBackend {
    pub bus: EventBus,
    scripts: Mutex<HashMap<PrerequisiteKind, Script>>,
    pub status: Mutex<StatusSnapshot>,
    pub disk: Mutex<DiskSpaceInfo>,
    pub permissions: Mutex<PermissionStatus>,
    invocations: Mutex<Vec<PrerequisiteKind>>,
    receivers_at_invoke: Mutex<Vec<usize>>,
    status_probes: AtomicUsize,
    prime_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            scripts: Mutex::new(HashMap::new()),
            status: Mutex::new(StatusSnapshot::all_missing()),
            disk: Mutex::new(DiskSpaceInfo::new(50.0, 2.0)),
            permissions: Mutex::new(PermissionStatus::default()),
            invocations: Mutex::new(Vec::new()),
            receivers_at_invoke: Mutex::new(Vec::new()),
            status_probes: AtomicUsize::new(0),
            prime_calls: AtomicUsize::new(0),
        }
    }

    pub fn script(&self, step: PrerequisiteKind, script: Script) {
        self.scripts.lock().unwrap().insert(step, script);
    }

    pub fn mark_installed(&self, step: PrerequisiteKind) {
        self.status
            .lock()
            .unwrap()
            .set(step, CheckResult::installed(None));
    }

    pub fn invocations(&self) -> Vec<PrerequisiteKind> {
        self.invocations.lock().unwrap().clone()
    }

    /// Live bus receiver count captured at each invocation — the
    /// subscribe-before-invoke evidence.
    pub fn receivers_at_invoke(&self) -> Vec<usize> {
        self.receivers_at_invoke.lock().unwrap().clone()
    }

    pub fn status_probe_calls(&self) -> usize {
        self.status_probes.load(Ordering::SeqCst)
    }

    pub fn prime_calls(&self) -> usize {
        self.prime_calls.load(Ordering::SeqCst)
    }

    fn run_step(&self, step: PrerequisiteKind) -> Result<()> {
        self.invocations.lock().unwrap().push(step);
        self.receivers_at_invoke
            .lock()
            .unwrap()
            .push(self.bus.receiver_count());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&step)
            .cloned()
            .unwrap_or(Script::Emit {
                lines: Vec::new(),
                success: true,
            });

        match script {
            Script::RefuseToStart => anyhow::bail!("backend unreachable"),
            Script::Hang => {
                self.bus.emit(InstallEvent::Start { step });
                Ok(())
            }
            Script::Fail(message) => {
                let bus = self.bus.clone();
                tokio::spawn(async move {
                    bus.emit(InstallEvent::Start { step });
                    tokio::time::sleep(PACE).await;
                    bus.emit(InstallEvent::Error {
                        step,
                        message: message.to_string(),
                    });
                });
                Ok(())
            }
            Script::Emit { lines, success } => {
                let bus = self.bus.clone();
                tokio::spawn(async move {
                    bus.emit(InstallEvent::Start { step });
                    for line in lines {
                        tokio::time::sleep(PACE).await;
                        bus.emit(InstallEvent::Output {
                            step,
                            line: line.to_string(),
                        });
                    }
                    tokio::time::sleep(PACE).await;
                    bus.emit(InstallEvent::Done { step, success });
                });
                // Flip ground truth so post-settle probes see the install.
                if success {
                    self.mark_installed(step);
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl InstallerBackend for ScriptedBackend {
    async fn install_toolchain(&self) -> Result<()> {
        self.run_step(PrerequisiteKind::Toolchain)
    }

    async fn install_package_manager(&self) -> Result<()> {
        self.run_step(PrerequisiteKind::PackageManager)
    }

    async fn install_runtime(&self) -> Result<()> {
        self.run_step(PrerequisiteKind::Runtime)
    }

    async fn install_agent_cli(&self) -> Result<()> {
        self.run_step(PrerequisiteKind::AgentCli)
    }

    async fn start_agent_authentication(&self) -> Result<()> {
        self.run_step(PrerequisiteKind::AgentAuth)
    }

    async fn probe_status(&self) -> Result<StatusSnapshot> {
        self.status_probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.status.lock().unwrap().clone())
    }

    async fn probe_disk_space(&self) -> Result<DiskSpaceInfo> {
        Ok(*self.disk.lock().unwrap())
    }

    async fn probe_permissions(&self) -> Result<PermissionStatus> {
        Ok(*self.permissions.lock().unwrap())
    }

    async fn prime_elevated_access(&self) -> Result<bool> {
        self.prime_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn request_accessibility_grant(&self) -> Result<bool> {
        self.permissions.lock().unwrap().accessibility_granted = true;
        Ok(true)
    }
}

/// Config tuned for tests: a settle delay short enough to keep the suite
/// fast but long enough that assertions against the grace window are not
/// racing the recheck.
pub fn test_config() -> ProvisionConfig {
    ProvisionConfig {
        settle_recheck_delay_ms: 200,
        ..ProvisionConfig::default()
    }
}

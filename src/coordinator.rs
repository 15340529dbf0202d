//! Orchestrator coordinator — the top-level owner of install sessions.
//!
//! Holds at most one active session chain at a time, gates every start
//! against fresh probe results, resolves unmet transitive dependencies into
//! a serial chain, and reconciles displayed state against ground truth with
//! a delayed recheck after every settlement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot, watch, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::InstallerBackend;
use crate::config::ProvisionConfig;
use crate::events::EventBus;
use crate::gate::{self, DenyReason, GateInput};
use crate::prereq::{install_chain, PrerequisiteKind};
use crate::probe::{RecheckReport, StatusProbe};
use crate::session::InstallSession;
use crate::state::InstallState;

// ─── Errors & notifications ──────────────────────────────────────────────────

/// Precondition failures from [`Coordinator::start_step`]. All are rejected
/// before any backend install call is made.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("another install is already running")]
    AlreadyRunning,
    #[error("permission denied: {0}")]
    PermissionDenied(DenyReason),
    /// The pre-flight probe itself failed — nothing was started.
    #[error(transparent)]
    Probe(#[from] anyhow::Error),
}

/// Coarse notifications for UI consumers. Full per-step state is pulled via
/// [`Coordinator::install_state`]; live output lines are available from the
/// shared event bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A session reached its terminal settlement.
    Settled {
        step: PrerequisiteKind,
        success: bool,
    },
    /// A recheck resolved — displayed installed-state should follow this.
    Recheck { report: RecheckReport },
}

/// Handle returned by `start_step`; resolves once the whole requested chain
/// has settled. Cancellation resolves it with `false` — it never errors.
#[derive(Debug)]
pub struct InstallHandle {
    step: PrerequisiteKind,
    rx: oneshot::Receiver<bool>,
}

impl InstallHandle {
    pub fn step(&self) -> PrerequisiteKind {
        self.step
    }

    /// Wait for the chain's terminal outcome. A vanished driver counts as
    /// failure rather than a panic.
    pub async fn wait(self) -> bool {
        self.rx.await.unwrap_or(false)
    }
}

// ─── Active slot ─────────────────────────────────────────────────────────────

struct ActiveInstall {
    /// Chain id — the driver clears the slot only when it still holds its
    /// own id (never another's).
    id: String,
    requested: PrerequisiteKind,
    abort_tx: watch::Sender<bool>,
    /// State handles for chain links, keyed by step, inserted as each link
    /// starts and removed when it settles.
    states: Arc<RwLock<HashMap<PrerequisiteKind, Arc<RwLock<InstallState>>>>>,
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

pub struct Coordinator<B: InstallerBackend + 'static> {
    backend: Arc<B>,
    bus: EventBus,
    config: Arc<ProvisionConfig>,
    probe: StatusProbe<B>,
    active: Arc<RwLock<Option<ActiveInstall>>>,
    /// Settled states kept visible during the post-settle grace window.
    recent: Arc<RwLock<HashMap<PrerequisiteKind, InstallState>>>,
    /// One-time elevated-access grant, remembered for the process lifetime.
    elevated_primed: Arc<AtomicBool>,
    notify_tx: broadcast::Sender<Notification>,
}

impl<B: InstallerBackend + 'static> Coordinator<B> {
    /// `bus` must be the same bus the backend emits into.
    pub fn new(backend: Arc<B>, bus: EventBus, config: ProvisionConfig) -> Self {
        let (notify_tx, _) = broadcast::channel(256);
        Self {
            probe: StatusProbe::new(Arc::clone(&backend)),
            backend,
            bus,
            config: Arc::new(config),
            active: Arc::new(RwLock::new(None)),
            recent: Arc::new(RwLock::new(HashMap::new())),
            elevated_primed: Arc::new(AtomicBool::new(false)),
            notify_tx,
        }
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }

    /// The shared event bus — consumers may subscribe for raw output lines.
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub async fn active_step(&self) -> Option<PrerequisiteKind> {
        self.active.read().await.as_ref().map(|a| a.requested)
    }

    /// Current view of one step's install attempt: the live session state
    /// while it runs, or the settled record during its grace window.
    pub async fn install_state(&self, step: PrerequisiteKind) -> Option<InstallState> {
        if let Some(active) = self.active.read().await.as_ref() {
            if let Some(handle) = active.states.read().await.get(&step) {
                return Some(handle.read().await.clone());
            }
        }
        self.recent.read().await.get(&step).cloned()
    }

    // ── Permission priming ───────────────────────────────────────────────

    /// Request the one-time elevated-access grant. Requested at most once:
    /// a previous grant is remembered for the process lifetime and not
    /// re-requested per step.
    pub async fn prime_elevated_access(&self) -> anyhow::Result<bool> {
        if self.elevated_primed.load(Ordering::Acquire) {
            return Ok(true);
        }
        let granted = self.backend.prime_elevated_access().await?;
        if granted {
            info!("elevated access primed for this process");
            self.elevated_primed.store(true, Ordering::Release);
        }
        Ok(granted)
    }

    /// Ask the platform for the accessibility-style grant. The authoritative
    /// answer remains `probe_permissions`, polled via `recheck_all`.
    pub async fn request_accessibility_grant(&self) -> anyhow::Result<bool> {
        self.backend.request_accessibility_grant().await
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Probe everything and notify consumers. Idempotent, side-effect-free
    /// beyond reporting, and safe to call while an install is running.
    pub async fn recheck_all(&self) -> anyhow::Result<RecheckReport> {
        let report = self.probe.recheck_all().await?;
        let _ = self.notify_tx.send(Notification::Recheck {
            report: report.clone(),
        });
        Ok(report)
    }

    /// If a session chain is active, trigger its abort signal; no-op
    /// otherwise. The pending handle resolves `false`; nothing is thrown.
    pub async fn cancel_active(&self) {
        let slot = self.active.read().await;
        if let Some(active) = slot.as_ref() {
            info!(chain = %active.id, step = %active.requested, "cancelling active install");
            let _ = active.abort_tx.send(true);
        }
    }

    /// Start `step`, first running any unmet transitive dependencies
    /// serially. Fails before any backend install call when another chain is
    /// active or the permission gate rejects any link.
    pub async fn start_step(&self, step: PrerequisiteKind) -> Result<InstallHandle, StartError> {
        // Fast path — don't bother probing while something is running.
        if self.active.read().await.is_some() {
            return Err(StartError::AlreadyRunning);
        }

        // Pre-flight: fresh ground truth for the gate and chain resolution.
        let report = self.probe.recheck_all().await?;
        let chain = install_chain(step, &report.status);

        let input = GateInput {
            snapshot: &report.status,
            permissions: report.permissions,
            disk: report.disk,
            elevated_primed: self.elevated_primed.load(Ordering::Acquire),
            session_active: false,
        };
        // Gate every link up front so a chain never starts work it cannot
        // finish (e.g. an unprimed elevated toolchain install three links in).
        for link in &chain {
            gate::can_start(*link, &input).map_err(|reason| match reason {
                DenyReason::AlreadyRunning => StartError::AlreadyRunning,
                other => StartError::PermissionDenied(other),
            })?;
        }

        // Acquire the slot under the write lock — re-check emptiness so two
        // concurrent starts cannot both pass the fast path.
        let (abort_tx, abort_rx) = watch::channel(false);
        let chain_id = format!("C-{}", &Uuid::new_v4().to_string()[..8]);
        let states: Arc<RwLock<HashMap<PrerequisiteKind, Arc<RwLock<InstallState>>>>> =
            Arc::new(RwLock::new(HashMap::new()));
        {
            let mut slot = self.active.write().await;
            if slot.is_some() {
                return Err(StartError::AlreadyRunning);
            }
            *slot = Some(ActiveInstall {
                id: chain_id.clone(),
                requested: step,
                abort_tx,
                states: Arc::clone(&states),
            });
        }

        info!(chain = %chain_id, requested = %step, links = chain.len(), "install chain starting");

        let (done_tx, done_rx) = oneshot::channel();
        self.spawn_driver(chain_id, chain, states, abort_rx, done_tx);

        Ok(InstallHandle { step, rx: done_rx })
    }

    /// Run the chain serially on a background task. The driver owns its
    /// links' receive loops, clears only its own slot, and resolves the
    /// handle exactly once.
    fn spawn_driver(
        &self,
        chain_id: String,
        chain: Vec<PrerequisiteKind>,
        states: Arc<RwLock<HashMap<PrerequisiteKind, Arc<RwLock<InstallState>>>>>,
        abort_rx: watch::Receiver<bool>,
        done_tx: oneshot::Sender<bool>,
    ) {
        let backend = Arc::clone(&self.backend);
        let bus = self.bus.clone();
        let config = Arc::clone(&self.config);
        let probe = self.probe.clone();
        let active = Arc::clone(&self.active);
        let recent = Arc::clone(&self.recent);
        let notify_tx = self.notify_tx.clone();

        tokio::spawn(async move {
            let mut overall = true;

            for link in chain {
                // Subscribe before invoking — the session consumes the
                // subscription, so the ordering is structural, not stylistic.
                let sub = bus.subscribe_step(link);
                let session = InstallSession::new(link, config.timeout_for(link), abort_rx.clone());
                let state_handle = session.state_handle();
                states.write().await.insert(link, Arc::clone(&state_handle));

                let outcome = session.run(sub, backend.as_ref()).await;

                // Move the settled record into the grace window and schedule
                // the ground-truth recheck that ends it.
                let settled = state_handle.read().await.clone();
                states.write().await.remove(&link);
                recent.write().await.insert(link, settled);
                let _ = notify_tx.send(Notification::Settled {
                    step: link,
                    success: outcome.success,
                });
                schedule_settle_recheck(
                    link,
                    probe.clone(),
                    Arc::clone(&recent),
                    notify_tx.clone(),
                    config.settle_recheck_delay(),
                );

                if !outcome.success {
                    if outcome.aborted {
                        info!(chain = %chain_id, step = %link, "chain aborted by cancellation");
                    } else {
                        warn!(chain = %chain_id, step = %link, "chain aborted: link failed");
                    }
                    overall = false;
                    break;
                }
            }

            // Clear only our own slot (another chain may own it by the time
            // a stale driver gets here).
            {
                let mut slot = active.write().await;
                if slot.as_ref().map(|a| a.id == chain_id).unwrap_or(false) {
                    *slot = None;
                }
            }

            info!(chain = %chain_id, success = overall, "install chain settled");
            let _ = done_tx.send(overall);
        });
    }
}

/// After a settlement, wait out OS/filesystem propagation and then re-derive
/// ground truth — the session's own success flag is never trusted as final.
/// The recheck also closes the step's grace window.
fn schedule_settle_recheck<B: InstallerBackend + ?Sized + 'static>(
    step: PrerequisiteKind,
    probe: StatusProbe<B>,
    recent: Arc<RwLock<HashMap<PrerequisiteKind, InstallState>>>,
    notify_tx: broadcast::Sender<Notification>,
    delay: std::time::Duration,
) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match probe.recheck_all().await {
            Ok(report) => {
                let _ = notify_tx.send(Notification::Recheck { report });
            }
            Err(e) => warn!(step = %step, err = %e, "settle recheck failed"),
        }
        recent.write().await.remove(&step);
    });
}

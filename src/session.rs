//! Install session — the stateful engine for one running install attempt.
//!
//! A session owns the abort signal, the advisory timeout, the accumulated
//! output log, and the current stage, and produces its terminal outcome
//! exactly once. Stage transitions are driven only by classified events from
//! the step's subscription; the sole exception is the synchronous entry into
//! `Preparing` at creation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::InstallerBackend;
use crate::classifier;
use crate::events::{InstallEvent, StepSubscription};
use crate::prereq::PrerequisiteKind;
use crate::state::{InstallStage, InstallState};

/// Terminal result of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub success: bool,
    /// True when the session ended via the abort signal rather than a
    /// backend-reported outcome. Aborts are not failures needing "retry"
    /// messaging — the step simply returns to its pre-attempt state.
    pub aborted: bool,
}

impl SessionOutcome {
    fn success() -> Self {
        Self {
            success: true,
            aborted: false,
        }
    }

    fn failure() -> Self {
        Self {
            success: false,
            aborted: false,
        }
    }

    fn aborted() -> Self {
        Self {
            success: false,
            aborted: true,
        }
    }
}

pub struct InstallSession {
    id: String,
    step: PrerequisiteKind,
    state: Arc<RwLock<InstallState>>,
    abort_rx: watch::Receiver<bool>,
    timeout: Duration,
}

impl InstallSession {
    /// Create a session for `step`. The state record enters `Preparing`
    /// synchronously, before any event has arrived.
    pub fn new(step: PrerequisiteKind, timeout: Duration, abort_rx: watch::Receiver<bool>) -> Self {
        Self {
            id: format!("S-{}", &Uuid::new_v4().to_string()[..8]),
            step,
            state: Arc::new(RwLock::new(InstallState::new(step))),
            abort_rx,
            timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn step(&self) -> PrerequisiteKind {
        self.step
    }

    /// Shared read handle onto the session's state. The session is the only
    /// writer while it runs; once settled the record is history.
    pub fn state_handle(&self) -> Arc<RwLock<InstallState>> {
        Arc::clone(&self.state)
    }

    /// Drive the session to its single terminal settlement.
    ///
    /// Consuming `sub` here is the subscribe-before-invoke contract: the
    /// subscription must already exist when this is called, so no event can
    /// be lost between subscribing and invoking. The subscription is dropped
    /// (released) exactly once, when this function returns.
    pub async fn run<B>(mut self, mut sub: StepSubscription, backend: &B) -> SessionOutcome
    where
        B: InstallerBackend + ?Sized,
    {
        debug_assert_eq!(sub.step(), self.step, "subscription/step mismatch");

        // A cancel that raced ahead of the run call still wins.
        if *self.abort_rx.borrow() {
            return self.settle_aborted().await;
        }

        // Invocation itself failing synchronously settles immediately — no
        // events will ever arrive, so waiting for the timeout would be wrong.
        if let Err(e) = backend.invoke(self.step).await {
            warn!(session = %self.id, step = %self.step, err = %e, "backend invocation failed");
            return self
                .settle_error(format!("could not start install: {e:#}"))
                .await;
        }

        // Advisory timeout: armed once, informs once, never fails the
        // session. Only abort or a terminal backend event is a hard stop.
        let advisory = tokio::time::sleep(self.timeout);
        tokio::pin!(advisory);
        let mut advisory_fired = false;

        loop {
            tokio::select! {
                changed = self.abort_rx.changed() => {
                    // A dropped sender means the owning coordinator went
                    // away — a lifetime boundary, treated as abort so no
                    // orphaned subscription survives.
                    if changed.is_err() || *self.abort_rx.borrow() {
                        return self.settle_aborted().await;
                    }
                }

                () = &mut advisory, if !advisory_fired => {
                    advisory_fired = true;
                    info!(session = %self.id, step = %self.step, "install taking longer than expected — still waiting");
                    let mut state = self.state.write().await;
                    state.push_line("This is taking longer than expected — still working…");
                }

                event = sub.next() => {
                    match event {
                        Some(InstallEvent::Start { .. }) => {
                            debug!(session = %self.id, step = %self.step, "backend started");
                        }
                        Some(InstallEvent::Output { line, .. }) => {
                            let mut state = self.state.write().await;
                            state.push_line(line);
                            if let Some((stage, message)) =
                                classifier::classify(self.step, &state.raw_log, state.stage)
                            {
                                debug!(session = %self.id, step = %self.step, %stage, "stage advanced");
                                state.advance(stage, message);
                            }
                        }
                        Some(InstallEvent::ActionRequired { message, .. }) => {
                            // Still installing, just blocked on the user.
                            let mut state = self.state.write().await;
                            state.action_required = Some(message);
                        }
                        Some(InstallEvent::Done { success: true, .. }) => {
                            return self.settle_done().await;
                        }
                        Some(InstallEvent::Done { success: false, .. }) => {
                            return self
                                .settle_error("Install failed. Please try again.".to_string())
                                .await;
                        }
                        Some(InstallEvent::Error { message, .. }) => {
                            // Terminal — no `done` will follow this.
                            return self.settle_error(message).await;
                        }
                        None => {
                            // Bus shut down mid-install; nothing more can
                            // arrive, so settle rather than hang.
                            return self
                                .settle_error(
                                    "event channel closed before the install finished".to_string(),
                                )
                                .await;
                        }
                    }
                }
            }
        }
    }

    async fn settle_done(self) -> SessionOutcome {
        let mut state = self.state.write().await;
        // Preserve a classifier jump ("Already installed!") — only write the
        // generic completion message when the ladder hasn't reached Done yet.
        if state.stage != InstallStage::Done {
            state.advance(InstallStage::Done, "Complete!");
        }
        state.action_required = None;
        state.settled_at = Some(chrono::Utc::now());
        info!(session = %self.id, step = %self.step, "session settled: success");
        SessionOutcome::success()
    }

    async fn settle_error(self, message: String) -> SessionOutcome {
        let mut state = self.state.write().await;
        state.push_line(message.clone());
        state.stage = InstallStage::Error;
        state.friendly_message = "Install failed. Please try again.".to_string();
        state.error_message = Some(message);
        state.action_required = None;
        state.settled_at = Some(chrono::Utc::now());
        info!(session = %self.id, step = %self.step, "session settled: error");
        SessionOutcome::failure()
    }

    async fn settle_aborted(self) -> SessionOutcome {
        let mut state = self.state.write().await;
        // Not a failure: the stage is left where it was and no error is
        // recorded; the settle recheck restores the pre-attempt display.
        state.friendly_message = "Cancelled.".to_string();
        state.action_required = None;
        state.settled_at = Some(chrono::Utc::now());
        info!(session = %self.id, step = %self.step, "session settled: aborted");
        SessionOutcome::aborted()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

//! Install lifecycle state — the coarse stage ladder and the per-attempt
//! mutable record owned by a running session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prereq::PrerequisiteKind;

// ─── Stage ladder ────────────────────────────────────────────────────────────

/// Coarse, user-facing phase of one install attempt.
///
/// The happy path is strictly ordered (`Preparing → Downloading → Installing
/// → Finishing → Done`); `Error` is a parallel terminal reachable from any
/// point. Stage changes are driven only by classified backend events, never
/// by wall-clock guesses — the single exception is the synchronous entry
/// into `Preparing` when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStage {
    Preparing,
    Downloading,
    Installing,
    Finishing,
    Done,
    Error,
}

impl InstallStage {
    /// Position on the happy-path ladder. `Error` sits outside the ladder
    /// and is handled explicitly by callers.
    pub fn rank(&self) -> u8 {
        match self {
            InstallStage::Preparing => 0,
            InstallStage::Downloading => 1,
            InstallStage::Installing => 2,
            InstallStage::Finishing => 3,
            InstallStage::Done => 4,
            InstallStage::Error => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallStage::Done | InstallStage::Error)
    }
}

impl std::fmt::Display for InstallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallStage::Preparing => write!(f, "preparing"),
            InstallStage::Downloading => write!(f, "downloading"),
            InstallStage::Installing => write!(f, "installing"),
            InstallStage::Finishing => write!(f, "finishing"),
            InstallStage::Done => write!(f, "done"),
            InstallStage::Error => write!(f, "error"),
        }
    }
}

// ─── Per-attempt state ───────────────────────────────────────────────────────

/// Mutable record of one install attempt.
///
/// Owned exclusively by the session running the step (single writer); once
/// the session settles the record becomes immutable history, visible to
/// consumers during the post-settle grace window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallState {
    pub step: PrerequisiteKind,
    pub stage: InstallStage,
    pub friendly_message: String,
    /// Append-only raw output lines, in arrival order.
    pub raw_log: Vec<String>,
    /// Set while the install is blocked on a user action (e.g. a sign-in
    /// prompt); does not change the stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl InstallState {
    /// Create the record for a freshly started attempt — enters `Preparing`
    /// synchronously, before any backend event has arrived.
    pub fn new(step: PrerequisiteKind) -> Self {
        Self {
            step,
            stage: InstallStage::Preparing,
            friendly_message: format!("Preparing to install {}…", step.label().to_lowercase()),
            raw_log: Vec::new(),
            action_required: None,
            error_message: None,
            started_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.raw_log.push(line.into());
    }

    /// Advance to `stage` with `message`, ignoring regressions: a proposed
    /// stage below the current rank is dropped so displayed progress never
    /// moves backwards, while forward jumps (e.g. straight to `Done` for an
    /// already-installed tool) are allowed.
    pub fn advance(&mut self, stage: InstallStage, message: impl Into<String>) {
        if stage.rank() < self.stage.rank() {
            return;
        }
        self.stage = stage;
        self.friendly_message = message.into();
    }

    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

// SPDX-License-Identifier: MIT
//! Permission gate — stateless predicates deciding whether an install step
//! may start, given current grants, disk space, and the active-session slot.
//!
//! Every denial is typed so callers can render a precise reason (disabled
//! button + hint) instead of a generic failure.

use thiserror::Error;

use crate::prereq::{DiskSpaceInfo, PermissionStatus, PrerequisiteKind, StatusSnapshot};

/// Why a step is not allowed to start right now.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DenyReason {
    #[error("another install is already running")]
    AlreadyRunning,
    #[error("insufficient disk space: {available_gb:.1} GB free, {required_gb:.1} GB required")]
    InsufficientDiskSpace {
        available_gb: f64,
        required_gb: f64,
    },
    #[error("elevated access has not been granted yet")]
    ElevatedAccessRequired,
    #[error("accessibility permission has not been granted yet")]
    AccessibilityRequired,
    #[error("{missing} must be installed first")]
    MissingPrerequisite { missing: PrerequisiteKind },
}

/// Everything the gate needs to decide. Assembled by the coordinator from
/// fresh probe results — the gate itself holds no state.
#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    pub snapshot: &'a StatusSnapshot,
    pub permissions: PermissionStatus,
    pub disk: DiskSpaceInfo,
    /// Whether the one-time elevated-access grant has been primed this
    /// process lifetime.
    pub elevated_primed: bool,
    /// Whether another session currently occupies the active slot.
    pub session_active: bool,
}

/// Decide whether `step` may start.
///
/// Check order matters for reporting: the active-session check comes first,
/// then environment (disk), then grants, then dependency state — so a caller
/// is never told "already running" when the real blocker is a grant.
pub fn can_start(step: PrerequisiteKind, input: &GateInput<'_>) -> Result<(), DenyReason> {
    if input.session_active {
        return Err(DenyReason::AlreadyRunning);
    }

    if !input.disk.sufficient {
        return Err(DenyReason::InsufficientDiskSpace {
            available_gb: input.disk.available_gb,
            required_gb: input.disk.required_gb,
        });
    }

    if step.requires_elevated_access()
        && !input.elevated_primed
        && !input.permissions.elevated_access_granted
    {
        return Err(DenyReason::ElevatedAccessRequired);
    }

    if step.requires_accessibility() && !input.permissions.accessibility_granted {
        return Err(DenyReason::AccessibilityRequired);
    }

    for dep in step.gate_dependencies() {
        if !input.snapshot.get(*dep).is_installed() {
            return Err(DenyReason::MissingPrerequisite { missing: *dep });
        }
    }

    Ok(())
}

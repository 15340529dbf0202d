//! Status probing — re-derives ground truth through the backend's read-only
//! probe operations. Pure reads, no side effects; results are recomputed on
//! demand and never persisted as authoritative.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::InstallerBackend;
use crate::prereq::{DiskSpaceInfo, PermissionStatus, StatusSnapshot};

/// Aggregate result of one full recheck: every prerequisite plus the
/// environment facts the permission gate needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecheckReport {
    pub status: StatusSnapshot,
    pub disk: DiskSpaceInfo,
    pub permissions: PermissionStatus,
    pub checked_at: DateTime<Utc>,
}

/// Read-only prober over an installer backend.
pub struct StatusProbe<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for StatusProbe<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: InstallerBackend + ?Sized> StatusProbe<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Probe everything: installed state per prerequisite, disk space, and
    /// permission grants. Idempotent and safe to call while an install is
    /// running — it never touches session state.
    pub async fn recheck_all(&self) -> Result<RecheckReport> {
        let status = self
            .backend
            .probe_status()
            .await
            .context("status probe failed")?;
        let disk = self
            .backend
            .probe_disk_space()
            .await
            .context("disk-space probe failed")?;
        let permissions = self
            .backend
            .probe_permissions()
            .await
            .context("permission probe failed")?;

        Ok(RecheckReport {
            status,
            disk,
            permissions,
            checked_at: Utc::now(),
        })
    }
}

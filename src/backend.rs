//! Installer backend seam.
//!
//! provisiond does not perform installations itself — it drives an external
//! capability that does. Implementations perform the actual download and
//! execution and report progress by emitting [`InstallEvent`]s on the shared
//! [`EventBus`] they were constructed with.
//!
//! Install operations are fire-and-eventually-reported: `Ok(())` means the
//! operation *started*; its terminal outcome arrives later as a `done` or
//! `error` event. A synchronous `Err` means the invocation itself failed and
//! no events will follow.

use anyhow::Result;
use async_trait::async_trait;

use crate::prereq::{DiskSpaceInfo, PermissionStatus, PrerequisiteKind, StatusSnapshot};

/// Common interface for installer backends.
#[async_trait]
pub trait InstallerBackend: Send + Sync {
    // ── Install operations (one per step) ────────────────────────────────

    async fn install_toolchain(&self) -> Result<()>;
    async fn install_package_manager(&self) -> Result<()>;
    async fn install_runtime(&self) -> Result<()>;
    async fn install_agent_cli(&self) -> Result<()>;
    async fn start_agent_authentication(&self) -> Result<()>;

    // ── Read-only probes ─────────────────────────────────────────────────

    /// Ground-truth installed state for every prerequisite.
    async fn probe_status(&self) -> Result<StatusSnapshot>;
    async fn probe_disk_space(&self) -> Result<DiskSpaceInfo>;
    async fn probe_permissions(&self) -> Result<PermissionStatus>;

    // ── Permission priming ───────────────────────────────────────────────

    /// Request the one-time elevated-access grant. Returns whether the user
    /// granted it.
    async fn prime_elevated_access(&self) -> Result<bool>;

    /// Request the accessibility-style grant. Returns whether the user
    /// granted it; the authoritative state is still `probe_permissions`.
    async fn request_accessibility_grant(&self) -> Result<bool>;

    // ── Dispatch ─────────────────────────────────────────────────────────

    /// Start the install operation for `step`.
    async fn invoke(&self, step: PrerequisiteKind) -> Result<()> {
        match step {
            PrerequisiteKind::Toolchain => self.install_toolchain().await,
            PrerequisiteKind::PackageManager => self.install_package_manager().await,
            PrerequisiteKind::Runtime => self.install_runtime().await,
            PrerequisiteKind::AgentCli => self.install_agent_cli().await,
            PrerequisiteKind::AgentAuth => self.start_agent_authentication().await,
        }
    }
}

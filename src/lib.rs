//! provisiond — prerequisite provisioning orchestrator.
//!
//! Drives an external installer backend to put a set of developer tools (a
//! build toolchain, a language runtime, an agent CLI, and that agent's
//! sign-in) onto the user's machine: sequences installs, streams classified
//! progress to in-process consumers, enforces permission preconditions,
//! handles cancellation and advisory timeouts, and reconciles displayed
//! state against ground truth after every attempt.
//!
//! The crate performs no installations itself — implement
//! [`backend::InstallerBackend`] and hand it to a
//! [`coordinator::Coordinator`] together with the shared
//! [`events::EventBus`] the backend emits into.

pub mod backend;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod doctor;
pub mod events;
pub mod gate;
pub mod host;
pub mod prereq;
pub mod probe;
pub mod session;
pub mod state;

pub use backend::InstallerBackend;
pub use config::ProvisionConfig;
pub use coordinator::{Coordinator, InstallHandle, Notification, StartError};
pub use events::{EventBus, InstallEvent, StepSubscription};
pub use gate::DenyReason;
pub use prereq::{
    CheckResult, CheckStatus, DiskSpaceInfo, PermissionStatus, PrerequisiteKind, StatusSnapshot,
};
pub use probe::{RecheckReport, StatusProbe};
pub use session::{InstallSession, SessionOutcome};
pub use state::{InstallStage, InstallState};

//! Integration tests for progress reporting: the observable stage ladder,
//! classifier jumps, exactly-once settlement, and the post-settle recheck
//! that reconciles display state with ground truth.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Script, ScriptedBackend};
use provisiond::{
    Coordinator, EventBus, InstallEvent, InstallStage, Notification, PrerequisiteKind,
    ProvisionConfig,
};

fn setup_with_delay(
    settle_recheck_delay_ms: u64,
) -> (Arc<ScriptedBackend>, Coordinator<ScriptedBackend>) {
    let bus = EventBus::new(64);
    let backend = Arc::new(ScriptedBackend::new(bus.clone()));
    let config = ProvisionConfig {
        settle_recheck_delay_ms,
        ..ProvisionConfig::default()
    };
    let coordinator = Coordinator::new(Arc::clone(&backend), bus, config);
    (backend, coordinator)
}

/// Runtime install walking the full ladder: `Preparing → Downloading →
/// Installing → Done`, followed by a scheduled ground-truth recheck.
#[tokio::test]
async fn runtime_install_walks_the_stage_ladder_and_rechecks() {
    let (backend, coordinator) = setup_with_delay(150);
    backend.mark_installed(PrerequisiteKind::Toolchain);
    backend.mark_installed(PrerequisiteKind::PackageManager);
    backend.script(PrerequisiteKind::Runtime, Script::Hang);

    let step = PrerequisiteKind::Runtime;
    let handle = coordinator.start_step(step).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = coordinator.install_state(step).await.unwrap();
    assert_eq!(state.stage, InstallStage::Preparing);

    backend.bus.emit(InstallEvent::Output {
        step,
        line: "downloading installer".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = coordinator.install_state(step).await.unwrap();
    assert_eq!(state.stage, InstallStage::Downloading);

    backend.bus.emit(InstallEvent::Output {
        step,
        line: "installing component".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = coordinator.install_state(step).await.unwrap();
    assert_eq!(state.stage, InstallStage::Installing);

    backend.mark_installed(step);
    let probes_before_settle = backend.status_probe_calls();
    backend.bus.emit(InstallEvent::Done {
        step,
        success: true,
    });
    assert!(handle.wait().await);

    let state = coordinator.install_state(step).await.unwrap();
    assert_eq!(state.stage, InstallStage::Done);
    assert_eq!(state.friendly_message, "Complete!");
    assert_eq!(
        state.raw_log,
        vec!["downloading installer", "installing component"]
    );

    // The settle recheck fires after the configured delay and closes the
    // grace window — display truth comes from the probe from then on.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(backend.status_probe_calls() > probes_before_settle);
    assert_eq!(coordinator.install_state(step).await, None);
    let report = coordinator.recheck_all().await.unwrap();
    assert!(report.status.get(step).is_installed());
}

/// An already-installed tool jumps straight to `Done`, and the terminal
/// `done` event does not clobber the classifier's message.
#[tokio::test]
async fn already_installed_toolchain_jumps_to_done() {
    let (backend, coordinator) = setup_with_delay(400);
    coordinator.prime_elevated_access().await.unwrap();
    backend.script(PrerequisiteKind::Toolchain, Script::Hang);

    let step = PrerequisiteKind::Toolchain;
    let handle = coordinator.start_step(step).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    backend.bus.emit(InstallEvent::Output {
        step,
        line: "toolchain is already installed".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = coordinator.install_state(step).await.unwrap();
    assert_eq!(state.stage, InstallStage::Done);
    assert_eq!(state.friendly_message, "Already installed!");

    backend.mark_installed(step);
    backend.bus.emit(InstallEvent::Done {
        step,
        success: true,
    });
    assert!(handle.wait().await);

    let state = coordinator.install_state(step).await.unwrap();
    assert_eq!(state.friendly_message, "Already installed!");
}

/// Exactly one settlement per session: late terminal events are ignored.
#[tokio::test]
async fn late_terminal_events_do_not_resettle() {
    let (backend, coordinator) = setup_with_delay(400);
    backend.mark_installed(PrerequisiteKind::Toolchain);
    backend.mark_installed(PrerequisiteKind::PackageManager);
    backend.script(
        PrerequisiteKind::Runtime,
        Script::Emit {
            lines: vec![],
            success: true,
        },
    );

    let step = PrerequisiteKind::Runtime;
    let handle = coordinator.start_step(step).await.unwrap();
    assert!(handle.wait().await);

    let settled = coordinator.install_state(step).await.unwrap();
    assert_eq!(settled.stage, InstallStage::Done);
    let settled_at = settled.settled_at;

    // A confused backend re-reporting after settlement changes nothing.
    backend.bus.emit(InstallEvent::Done {
        step,
        success: false,
    });
    backend.bus.emit(InstallEvent::Error {
        step,
        message: "late failure".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(40)).await;

    let after = coordinator.install_state(step).await.unwrap();
    assert_eq!(after.stage, InstallStage::Done);
    assert_eq!(after.error_message, None);
    assert_eq!(after.settled_at, settled_at);
}

/// Consumers hear a `settled` notification for the session result and then a
/// `recheck` carrying fresh ground truth.
#[tokio::test]
async fn notifications_follow_settlement_then_recheck() {
    let (backend, coordinator) = setup_with_delay(40);
    backend.mark_installed(PrerequisiteKind::Toolchain);
    backend.mark_installed(PrerequisiteKind::PackageManager);
    backend.script(
        PrerequisiteKind::Runtime,
        Script::Emit {
            lines: vec!["installing runtime"],
            success: true,
        },
    );

    let mut notifications = coordinator.subscribe_notifications();
    let handle = coordinator
        .start_step(PrerequisiteKind::Runtime)
        .await
        .unwrap();
    assert!(handle.wait().await);

    let first = tokio::time::timeout(Duration::from_secs(2), notifications.recv())
        .await
        .expect("notification timed out")
        .unwrap();
    match first {
        Notification::Settled { step, success } => {
            assert_eq!(step, PrerequisiteKind::Runtime);
            assert!(success);
        }
        other => panic!("expected settled notification, got {other:?}"),
    }

    let second = tokio::time::timeout(Duration::from_secs(2), notifications.recv())
        .await
        .expect("notification timed out")
        .unwrap();
    match second {
        Notification::Recheck { report } => {
            assert!(report.status.get(PrerequisiteKind::Runtime).is_installed());
        }
        other => panic!("expected recheck notification, got {other:?}"),
    }
}

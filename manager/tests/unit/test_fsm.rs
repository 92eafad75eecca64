//! Deployment status machine tests

use bothandler::deploy::fsm::{DeploymentEvent, DeploymentStatus};

#[test]
fn test_queue_then_finish() {
    let status = DeploymentStatus::Pending;
    let status = status.process(DeploymentEvent::Queue).unwrap();
    assert_eq!(status, DeploymentStatus::Queued);

    let status = status.process(DeploymentEvent::Succeed).unwrap();
    assert_eq!(status, DeploymentStatus::Success);
    assert!(status.is_terminal());
}

#[test]
fn test_pending_can_finish_directly() {
    let status = DeploymentStatus::Pending
        .process(DeploymentEvent::Fail)
        .unwrap();
    assert_eq!(status, DeploymentStatus::Failed);
}

#[test]
fn test_terminal_states_are_final() {
    for terminal in [DeploymentStatus::Success, DeploymentStatus::Failed] {
        for event in [
            DeploymentEvent::Queue,
            DeploymentEvent::Succeed,
            DeploymentEvent::Fail,
        ] {
            assert!(terminal.process(event).is_err());
        }
    }
}

#[test]
fn test_no_backwards_transitions() {
    assert!(!DeploymentStatus::Queued.can_transition_to(DeploymentStatus::Pending));
    assert!(!DeploymentStatus::Queued.can_transition_to(DeploymentStatus::Queued));
    assert!(DeploymentStatus::Queued
        .process(DeploymentEvent::Queue)
        .is_err());
}

#[test]
fn test_wire_names() {
    assert_eq!(
        serde_json::to_string(&DeploymentStatus::Queued).unwrap(),
        "\"queued\""
    );
    assert_eq!(DeploymentStatus::Failed.to_string(), "failed");
}

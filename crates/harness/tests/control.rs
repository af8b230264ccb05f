use std::sync::Arc;
use std::time::Duration;

use resync_core::{ActionTag, ControlMessage, NotificationRequest};
use resync_engine::config::{ControlConfig, NotificationConfig};
use resync_engine::control::{self, BackgroundRuntime, Handled, RouteOutcome};
use resync_engine::{CredentialStore, ForegroundInstance, NotificationDispatcher};
use resync_harness::{Behavior, TestHost, TestInstance, TestSurface};

fn control_config() -> ControlConfig {
    ControlConfig {
        terminate_timeout_ms: 100,
        ..ControlConfig::default()
    }
}

fn runtime(host: Arc<TestHost>, surface: Arc<TestSurface>, credentials: CredentialStore) -> BackgroundRuntime {
    BackgroundRuntime::new(
        credentials,
        host.clone(),
        host,
        NotificationDispatcher::new(surface, NotificationConfig::default()),
        control_config(),
    )
}

// ============================================================================
// Termination
// ============================================================================

#[tokio::test]
async fn terminate_falls_back_after_unresponsive_instance() {
    let responsive = TestInstance::acknowledging();
    let silent = TestInstance::unresponsive();
    let host = TestHost::with_instances(vec![responsive.clone(), silent.clone()]);
    let runtime = runtime(host.clone(), Arc::new(TestSurface::new()), CredentialStore::new());

    let handled = tokio::time::timeout(
        Duration::from_secs(5),
        runtime.handle(ControlMessage::TerminateApp),
    )
    .await
    .expect("terminate must finish within the bounded wait");

    let Handled::Terminated(report) = handled else {
        panic!("unexpected outcome {handled:?}");
    };
    assert_eq!(report.acknowledged, vec![responsive.id()]);
    assert_eq!(report.timed_out.len(), 1);
    assert!(report.deregistered);
    assert_eq!(host.deregistrations(), 1);
    assert_eq!(responsive.navigations(), vec!["about:blank".to_string()]);
    assert_eq!(silent.navigations(), vec!["about:blank".to_string()]);
}

#[tokio::test]
async fn terminate_survives_failures_everywhere() {
    let broken = TestInstance::new(Behavior::Fail);
    let fine = TestInstance::acknowledging();
    let host = TestHost::with_instances(vec![broken, fine]);
    host.fail_deregister();
    let runtime = runtime(host.clone(), Arc::new(TestSurface::new()), CredentialStore::new());

    let Handled::Terminated(report) = runtime.handle(ControlMessage::TerminateApp).await else {
        panic!("terminate must always report");
    };
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.acknowledged.len(), 1);
    assert!(!report.deregistered);
    assert!(report.deregister_error.is_some());
}

#[tokio::test]
async fn terminate_clears_session_credentials() {
    let credentials = CredentialStore::new();
    let runtime = runtime(TestHost::new(), Arc::new(TestSurface::new()), credentials.clone());

    runtime
        .handle(ControlMessage::CredentialsUpdate {
            endpoint: "https://db.example.com".into(),
            key: "k".into(),
        })
        .await;
    assert!(credentials.is_set());

    runtime.handle(ControlMessage::TerminateApp).await;
    assert!(!credentials.is_set());
}

// ============================================================================
// Credentials and lifecycle
// ============================================================================

#[tokio::test]
async fn credentials_update_is_last_write_wins() {
    let credentials = CredentialStore::new();
    let runtime = runtime(TestHost::new(), Arc::new(TestSurface::new()), credentials.clone());

    for key in ["first", "second"] {
        let handled = runtime
            .handle(ControlMessage::CredentialsUpdate {
                endpoint: "https://db.example.com".into(),
                key: key.into(),
            })
            .await;
        assert_eq!(handled, Handled::CredentialsStored);
    }
    assert_eq!(credentials.get().map(|c| c.key), Some("second".to_string()));
}

#[tokio::test]
async fn invalid_credentials_are_reported_not_stored() {
    let credentials = CredentialStore::new();
    let runtime = runtime(TestHost::new(), Arc::new(TestSurface::new()), credentials.clone());

    let handled = runtime
        .handle(ControlMessage::CredentialsUpdate {
            endpoint: "::not a url::".into(),
            key: "k".into(),
        })
        .await;
    assert!(matches!(handled, Handled::Failed { kind: "CredentialsUpdate", .. }));
    assert!(!credentials.is_set());
}

#[tokio::test]
async fn activate_now_reaches_host() {
    let host = TestHost::new();
    let runtime = runtime(host.clone(), Arc::new(TestSurface::new()), CredentialStore::new());
    assert_eq!(runtime.handle(ControlMessage::ActivateNow).await, Handled::Activated);
    assert_eq!(host.activations(), 1);
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn show_notification_renders_with_routing_target() {
    let surface = Arc::new(TestSurface::new());
    let runtime = runtime(TestHost::new(), surface.clone(), CredentialStore::new());
    let mut request = NotificationRequest::new("New booking", "Room A1 requested");
    request.role = Some("admin".into());

    let handled = runtime.handle(ControlMessage::ShowNotification(request)).await;

    assert!(matches!(handled, Handled::Notified(ref outcome) if outcome.is_shown()));
    let shown = surface.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].data.target, "/admin");
}

#[tokio::test]
async fn failed_notification_is_caught() {
    let runtime = runtime(TestHost::new(), Arc::new(TestSurface::failing()), CredentialStore::new());
    let handled = runtime
        .handle(ControlMessage::ShowNotification(NotificationRequest::new("t", "b")))
        .await;
    let Handled::Notified(outcome) = handled else {
        panic!("unexpected outcome {handled:?}");
    };
    assert!(!outcome.is_shown());
}

#[tokio::test]
async fn primary_action_focuses_existing_instance() {
    let instance = TestInstance::acknowledging();
    let host = TestHost::with_instances(vec![instance.clone()]);
    let runtime = runtime(host.clone(), Arc::new(TestSurface::new()), CredentialStore::new());

    let handled = runtime
        .handle(ControlMessage::NotificationAction {
            action: ActionTag::Primary,
            target: Some("/staff/bookings".into()),
        })
        .await;

    assert!(matches!(handled, Handled::Routed(RouteOutcome::Focused(_))));
    assert_eq!(instance.focus_count(), 1);
    assert_eq!(instance.navigations(), vec!["/staff/bookings".to_string()]);
    assert!(host.opened().is_empty());
}

#[tokio::test]
async fn primary_action_opens_instance_when_none_exist() {
    let host = TestHost::new();
    let runtime = runtime(host.clone(), Arc::new(TestSurface::new()), CredentialStore::new());

    let handled = runtime
        .handle(ControlMessage::NotificationAction {
            action: ActionTag::Primary,
            target: None,
        })
        .await;

    assert!(matches!(handled, Handled::Routed(RouteOutcome::Opened(_))));
    assert_eq!(host.opened(), vec!["/".to_string()]);
}

#[tokio::test]
async fn dismiss_does_nothing() {
    let instance = TestInstance::acknowledging();
    let host = TestHost::with_instances(vec![instance.clone()]);
    let runtime = runtime(host.clone(), Arc::new(TestSurface::new()), CredentialStore::new());

    let handled = runtime
        .handle(ControlMessage::NotificationAction {
            action: ActionTag::Dismiss,
            target: Some("/admin".into()),
        })
        .await;

    assert_eq!(handled, Handled::Routed(RouteOutcome::Ignored));
    assert_eq!(instance.focus_count(), 0);
    assert!(host.opened().is_empty());
}

// ============================================================================
// Dispatch loop
// ============================================================================

#[tokio::test]
async fn run_processes_until_senders_drop() {
    let host = TestHost::new();
    let surface = Arc::new(TestSurface::new());
    let runtime = runtime(host.clone(), surface.clone(), CredentialStore::new());
    let (sender, receiver) = control::channel(8);

    let loop_task = tokio::spawn(async move { runtime.run(receiver).await });
    sender.send(ControlMessage::ActivateNow).await.unwrap();
    sender
        .send(ControlMessage::ShowNotification(NotificationRequest::new("a", "b")))
        .await
        .unwrap();
    sender
        .send(ControlMessage::NotificationAction {
            action: ActionTag::Dismiss,
            target: None,
        })
        .await
        .unwrap();
    drop(sender);

    assert_eq!(loop_task.await.unwrap(), 3);
    assert_eq!(host.activations(), 1);
    assert_eq!(surface.shown().len(), 1);
}

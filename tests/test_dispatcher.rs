//! Dispatch behaviour tests
//!
//! Drive the dispatcher the way the supervisor does and check which host
//! commands would have been run.

use raspi_off::dispatch::{ActionDispatcher, HostAction, InboundMessage, SystemCommandRunner};
use raspi_off::testing::MockCommandRunner;

#[tokio::test]
async fn test_shutdown_topic_with_delay_payload() {
    let runner = MockCommandRunner::new();
    let dispatcher = ActionDispatcher::new(runner.clone());

    dispatcher
        .on_message("home/raspi-off/shutdown", b"+10")
        .await;

    let executed = runner.executed().await;
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].action, HostAction::Shutdown);
    assert_eq!(executed[0].args(), ["-h", "+10"]);
}

#[tokio::test]
async fn test_reboot_topic_with_empty_payload_runs_now() {
    let runner = MockCommandRunner::new();
    let dispatcher = ActionDispatcher::new(runner.clone());

    dispatcher.on_message("home/raspi-off/reboot", b"").await;

    let executed = runner.executed().await;
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].action, HostAction::Reboot);
    assert_eq!(executed[0].args(), ["-r", "now"]);
}

#[tokio::test]
async fn test_failed_command_does_not_stop_later_messages() {
    // First call fails as if `shutdown` were missing
    let runner = MockCommandRunner::failing_on([0]);
    let (handle, worker) = ActionDispatcher::new(runner.clone()).spawn();

    assert!(
        handle
            .dispatch(InboundMessage::new("raspi-off/reboot", ""))
            .await
    );
    assert!(
        handle
            .dispatch(InboundMessage::new("raspi-off/shutdown", "23:00"))
            .await
    );
    drop(handle);
    worker.await.expect("worker should not panic");

    let executed = runner.executed().await;
    assert_eq!(executed.len(), 2);
    assert_eq!(executed[1].action, HostAction::Shutdown);
    assert_eq!(executed[1].delay, "23:00");
}

#[tokio::test]
async fn test_unrelated_topics_are_ignored() {
    let runner = MockCommandRunner::new();
    let (handle, worker) = ActionDispatcher::new(runner.clone()).spawn();

    handle
        .dispatch(InboundMessage::new("raspi-off/status", "now"))
        .await;
    handle
        .dispatch(InboundMessage::new("raspi-off/reboot/extra", ""))
        .await;
    drop(handle);
    worker.await.unwrap();

    assert!(runner.executed().await.is_empty());
}

#[tokio::test]
async fn test_missing_executable_is_swallowed() {
    let dispatcher = ActionDispatcher::new(SystemCommandRunner::new(
        "/nonexistent/raspi-off-test/shutdown",
    ));

    let attempted = dispatcher.on_message("raspi-off/reboot", b"").await;
    assert_eq!(attempted.map(|c| c.action), Some(HostAction::Reboot));
}

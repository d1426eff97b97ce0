mod common;

use std::time::Duration;

use tokio::time::Instant;

use common::MockDevice;
use ir_fan_lib::serial::{LinkEvent, LinkManager, LinkStatus, SerialError, BAUD_RATE};

const RECONNECT: Duration = Duration::from_millis(5000);

#[tokio::test(start_paused = true)]
async fn starts_closed_and_rejects_writes() {
    let device = MockDevice::new();
    let link = LinkManager::spawn(device.connector(), RECONNECT);

    assert_eq!(link.status(), LinkStatus::Closed);
    assert!(!link.is_ready());
    assert!(matches!(link.write(b"ir tx\r\n").await, Err(SerialError::LinkNotReady)));
    assert_eq!(device.write_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn open_then_write() {
    let device = MockDevice::new();
    let link = LinkManager::spawn(device.connector(), RECONNECT);

    link.open("/dev/mock", BAUD_RATE).await.expect("open");
    assert!(link.is_ready());

    link.write(b"hello\r\n").await.expect("write");
    assert_eq!(device.writes(), vec!["hello\r\n".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn not_ready_as_soon_as_transport_drops() {
    let device = MockDevice::new();
    let link = LinkManager::spawn(device.connector(), RECONNECT);
    link.open("/dev/mock", BAUD_RATE).await.unwrap();
    assert!(link.is_ready());

    // No yield: the link task has not seen the close event yet
    device.drop_connection();
    assert_eq!(link.status(), LinkStatus::Open);
    assert!(!link.is_ready());
    assert!(matches!(link.write(b"x\r\n").await, Err(SerialError::LinkNotReady)));
    assert_eq!(device.write_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn write_failure_is_reported() {
    let device = MockDevice::new();
    let link = LinkManager::spawn(device.connector(), RECONNECT);
    link.open("/dev/mock", BAUD_RATE).await.unwrap();

    device.fail_write_at(1);
    let result = link.write(b"x\r\n").await;
    assert!(matches!(result, Err(SerialError::TransportWriteFailure(_))));
}

#[tokio::test(start_paused = true)]
async fn close_event_triggers_reconnect_after_interval() {
    let device = MockDevice::new();
    let link = LinkManager::spawn(device.connector(), RECONNECT);
    let mut status = link.status_receiver();

    link.open("/dev/mock", BAUD_RATE).await.unwrap();
    assert_eq!(device.open_attempts(), 1);

    device.drop_connection();
    status.wait_for(|s| *s == LinkStatus::Closed).await.unwrap();
    let closed_at = Instant::now();
    assert!(matches!(link.write(b"x").await, Err(SerialError::LinkNotReady)));

    status.wait_for(|s| *s == LinkStatus::Open).await.unwrap();
    assert!(closed_at.elapsed() >= RECONNECT);
    assert_eq!(device.open_attempts(), 2);

    // A successful reopen leaves nothing scheduled
    tokio::time::sleep(RECONNECT * 4).await;
    assert_eq!(device.open_attempts(), 2);
    assert_eq!(device.open_handles(), 1);
    assert!(link.is_ready());
}

#[tokio::test(start_paused = true)]
async fn runtime_error_is_treated_like_close() {
    let device = MockDevice::new();
    let link = LinkManager::spawn(device.connector(), RECONNECT);
    let mut events = link.subscribe();
    let mut status = link.status_receiver();

    link.open("/dev/mock", BAUD_RATE).await.unwrap();
    device.raise_error("framing error");

    status.wait_for(|s| *s == LinkStatus::Closed).await.unwrap();
    status.wait_for(|s| *s == LinkStatus::Open).await.unwrap();
    assert_eq!(device.open_attempts(), 2);
    // The errored handle was closed before the new one was opened
    assert_eq!(device.open_handles(), 1);

    let mut saw_fault = false;
    while let Ok(event) = events.try_recv() {
        if event == LinkEvent::Fault("framing error".to_string()) {
            saw_fault = true;
        }
    }
    assert!(saw_fault);
}

#[tokio::test(start_paused = true)]
async fn failed_open_retries_until_success() {
    let device = MockDevice::new();
    device.fail_next_opens(3);
    let link = LinkManager::spawn(device.connector(), RECONNECT);
    let mut status = link.status_receiver();

    let started = Instant::now();
    let result = link.open("/dev/mock", BAUD_RATE).await;
    assert!(matches!(result, Err(SerialError::TransportOpenFailure(_))));
    assert_eq!(link.status(), LinkStatus::Closed);

    status.wait_for(|s| *s == LinkStatus::Open).await.unwrap();
    assert_eq!(device.open_attempts(), 4);
    assert!(started.elapsed() >= RECONNECT * 3);
    assert!(started.elapsed() < RECONNECT * 4);
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_fault_with_failing_retry() {
    let device = MockDevice::new();
    let link = LinkManager::spawn(device.connector(), RECONNECT);
    let mut status = link.status_receiver();

    link.open("/dev/mock", BAUD_RATE).await.unwrap();
    device.fail_next_opens(1);
    device.drop_connection();
    status.wait_for(|s| *s == LinkStatus::Closed).await.unwrap();

    // One failed retry at 5s, one successful retry at 10s
    tokio::time::sleep(RECONNECT * 2 + Duration::from_millis(1)).await;
    assert_eq!(device.open_attempts(), 3);
    assert!(link.is_ready());

    tokio::time::sleep(RECONNECT * 3).await;
    assert_eq!(device.open_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn rearming_a_pending_reconnect_keeps_the_first_deadline() {
    let device = MockDevice::new();
    device.fail_next_opens(2);
    let link = LinkManager::spawn(device.connector(), RECONNECT);

    assert!(link.open("/dev/mock", BAUD_RATE).await.is_err());
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(link.open("/dev/mock", BAUD_RATE).await.is_err());
    assert_eq!(device.open_attempts(), 2);

    // Still due 5s after the first failure, not after the second
    tokio::time::sleep(Duration::from_millis(3001)).await;
    assert_eq!(device.open_attempts(), 3);
    assert!(link.is_ready());
}

#[tokio::test(start_paused = true)]
async fn explicit_close_stops_reconnecting() {
    let device = MockDevice::new();
    device.fail_next_opens(1);
    let link = LinkManager::spawn(device.connector(), RECONNECT);

    assert!(link.open("/dev/mock", BAUD_RATE).await.is_err());
    link.close().await.unwrap();
    assert_eq!(link.status(), LinkStatus::Closed);

    tokio::time::sleep(RECONNECT * 3).await;
    assert_eq!(device.open_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_releases_the_handle() {
    let device = MockDevice::new();
    let link = LinkManager::spawn(device.connector(), RECONNECT);
    let mut events = link.subscribe();

    link.open("/dev/mock", BAUD_RATE).await.unwrap();
    assert_eq!(device.open_handles(), 1);

    link.close().await.unwrap();
    assert_eq!(device.open_handles(), 0);
    assert!(matches!(link.write(b"x").await, Err(SerialError::LinkNotReady)));

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let LinkEvent::StatusChanged(status) = event {
            statuses.push(status);
        }
    }
    assert_eq!(
        statuses,
        vec![
            LinkStatus::Opening,
            LinkStatus::Open,
            LinkStatus::Closing,
            LinkStatus::Closed
        ]
    );
}

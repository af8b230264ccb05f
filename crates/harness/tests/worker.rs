use std::sync::Arc;
use std::time::Duration;

use resync_core::{ControlMessage, Record, Table};
use resync_engine::config::{ControlConfig, NotificationConfig, SyncConfig};
use resync_engine::{BackgroundRuntime, CredentialStore, NotificationDispatcher, Outbox, SyncWorker};
use resync_harness::{TestClient, TestHost, TestSurface};
use resync_storage::{LocalStore, OperationQueue, SqliteStore};

/// Long enough that only explicit wake-ups trigger drains during a test.
fn quiet_config() -> SyncConfig {
    SyncConfig {
        interval_secs: 3600,
        ..SyncConfig::default()
    }
}

async fn wait_until_drained(store: &SqliteStore) -> Result<(), Box<dyn std::error::Error>> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.is_empty().unwrap_or(false) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn explicit_wake_drains_queue() -> Result<(), Box<dyn std::error::Error>> {
    let client = TestClient::new()?;
    let worker = SyncWorker::spawn(client.engine.clone(), &quiet_config());

    client.book("A1")?;
    client.add_facility("Pool")?;
    worker.wake();

    wait_until_drained(&client.store).await?;
    assert_eq!(client.gateway.call_count(), 2);
    worker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn outbox_save_wakes_worker() -> Result<(), Box<dyn std::error::Error>> {
    let client = TestClient::new()?;
    let worker = SyncWorker::spawn(client.engine.clone(), &quiet_config());
    let shared: Arc<dyn LocalStore> = client.store.clone();
    let outbox = Outbox::new(shared).with_waker(worker.waker());

    outbox.save(Table::Bookings, Record::new().field("room", "C3"))?;

    wait_until_drained(&client.store).await?;
    assert_eq!(client.gateway.call_count(), 1);
    worker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn credentials_update_triggers_drain() -> Result<(), Box<dyn std::error::Error>> {
    let client = TestClient::new()?;
    client.book("D4")?;
    let worker = SyncWorker::spawn(client.engine.clone(), &quiet_config());

    let host = TestHost::new();
    let runtime = BackgroundRuntime::new(
        CredentialStore::new(),
        host.clone(),
        host,
        NotificationDispatcher::new(Arc::new(TestSurface::new()), NotificationConfig::default()),
        ControlConfig::default(),
    )
    .with_waker(worker.waker());

    runtime
        .handle(ControlMessage::CredentialsUpdate {
            endpoint: "https://db.example.com".into(),
            key: "anon".into(),
        })
        .await;

    wait_until_drained(&client.store).await?;
    worker.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_drain() -> Result<(), Box<dyn std::error::Error>> {
    let client = TestClient::new()?;
    client.gateway.hold();
    client.book("E5")?;
    let worker = SyncWorker::spawn(client.engine.clone(), &quiet_config());
    worker.wake();
    client.gateway.wait_for_request().await;

    let stopping = tokio::spawn(worker.shutdown());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!stopping.is_finished());

    client.gateway.release();
    tokio::time::timeout(Duration::from_secs(5), stopping).await??;
    assert!(client.store.is_empty()?);
    Ok(())
}

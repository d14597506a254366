//! End-to-end shutdown against a real listener.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use greenlight::accounts::MemoryAccountStore;
use greenlight::credentials::{MemoryTokenStore, Scope};
use greenlight::lifecycle::{LifecycleState, Service};
use greenlight::notification::AccountEvent;

use greenlight::http::X_REQUEST_ID;

mod common;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

#[tokio::test]
async fn signal_waits_for_background_work_then_stops() {
    let notifier = Arc::new(common::RecordingNotifier::slow(Duration::from_millis(300)));
    let mut config = common::test_config();
    config.limiter.enabled = false;

    let service = Service::with_parts(
        config,
        Arc::new(MemoryTokenStore::new()),
        Arc::new(MemoryAccountStore::new()),
        notifier.clone(),
    );
    let tokens = service.state().tokens.clone();
    let mut state = service.lifecycle_state();
    let token = tokens.new_token_for(11, Scope::Authentication).await.unwrap();

    let (listener, base) = bind().await;
    let (signal_tx, signal_rx) = oneshot::channel::<()>();
    let run = tokio::spawn(service.run(listener, async move {
        let _ = signal_rx.await;
        "SIGTERM"
    }));

    let client = reqwest::Client::new();
    let health = client
        .get(format!("{base}/v1/healthcheck"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    assert!(health.headers().contains_key(X_REQUEST_ID));

    let revoke = client
        .delete(format!("{base}/v1/tokens/authentication"))
        .bearer_auth(&token.plaintext)
        .send()
        .await
        .unwrap();
    assert_eq!(revoke.status(), reqwest::StatusCode::NO_CONTENT);
    drop(client);

    signal_tx.send(()).unwrap();
    run.await.unwrap().unwrap();

    assert_eq!(notifier.events(), vec![(11, AccountEvent::SessionsRevoked)]);
    assert_eq!(*state.borrow_and_update(), LifecycleState::Stopped);

    let after = reqwest::Client::new()
        .get(format!("{base}/v1/healthcheck"))
        .timeout(Duration::from_secs(2))
        .send()
        .await;
    assert!(after.is_err(), "listener should be closed after shutdown");
}

#[tokio::test]
async fn lifecycle_reports_draining_before_stopped() {
    let notifier = Arc::new(common::RecordingNotifier::slow(Duration::from_millis(300)));
    let mut config = common::test_config();
    config.limiter.enabled = false;

    let service = Service::with_parts(
        config,
        Arc::new(MemoryTokenStore::new()),
        Arc::new(MemoryAccountStore::new()),
        notifier,
    );
    let tasks = service.state().tasks.clone();
    let mut state = service.lifecycle_state();

    tasks.run("held-open", async {
        tokio::time::sleep(Duration::from_millis(300)).await;
    });

    let (listener, _base) = bind().await;
    let run = tokio::spawn(service.run(listener, async { "SIGINT" }));

    state
        .wait_for(|s| *s == LifecycleState::Draining)
        .await
        .unwrap();
    assert_eq!(tasks.pending(), 1);

    run.await.unwrap().unwrap();
    assert_eq!(*state.borrow(), LifecycleState::Stopped);
    assert_eq!(tasks.pending(), 0);
}

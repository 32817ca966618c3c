mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::require_conn;
use pgwire_client::Notification;

async fn wait_until(predicate: impl Fn() -> bool) {
    for _ in 0..50 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn two_listeners_on_the_same_channel_both_receive() {
    let conn = require_conn!();

    let received_a: Arc<std::sync::Mutex<Vec<Notification>>> = Arc::default();
    let received_b: Arc<std::sync::Mutex<Vec<Notification>>> = Arc::default();

    let ra = received_a.clone();
    let id_a = conn
        .add_listener("pw_test_channel", Arc::new(move |n| ra.lock().unwrap().push(n)))
        .await
        .unwrap();
    let rb = received_b.clone();
    let id_b = conn
        .add_listener("pw_test_channel", Arc::new(move |n| rb.lock().unwrap().push(n)))
        .await
        .unwrap();

    conn.query("NOTIFY pw_test_channel, 'p'", &[]).await.unwrap();
    wait_until(|| !received_a.lock().unwrap().is_empty() && !received_b.lock().unwrap().is_empty())
        .await;

    assert_eq!(received_a.lock().unwrap()[0].payload, "p");
    assert_eq!(received_a.lock().unwrap()[0].channel, "pw_test_channel");
    assert_eq!(received_a.lock().unwrap()[0].pid, conn.pid());
    assert_eq!(received_b.lock().unwrap().len(), 1);

    conn.remove_listener("pw_test_channel", id_a).await.unwrap();
    conn.query("NOTIFY pw_test_channel, 'q'", &[]).await.unwrap();
    wait_until(|| received_b.lock().unwrap().len() == 2).await;

    assert_eq!(received_a.lock().unwrap().len(), 1, "removed listener must not see later notifications");
    assert_eq!(received_b.lock().unwrap().len(), 2);

    conn.remove_listener("pw_test_channel", id_b).await.unwrap();
}

#[tokio::test]
async fn cross_connection_notification_carries_sender_pid() {
    let listener = require_conn!();
    let Some(notifier) = common::connect().await else {
        return;
    };

    let count = Arc::new(AtomicUsize::new(0));
    let last: Arc<std::sync::Mutex<Option<Notification>>> = Arc::default();
    let c = count.clone();
    let l = last.clone();
    listener
        .add_listener(
            "pw_cross_channel",
            Arc::new(move |n| {
                c.fetch_add(1, Ordering::SeqCst);
                *l.lock().unwrap() = Some(n);
            }),
        )
        .await
        .unwrap();

    notifier
        .query("NOTIFY pw_cross_channel, 'hello'", &[])
        .await
        .unwrap();

    wait_until(|| count.load(Ordering::SeqCst) == 1).await;

    let notification = last.lock().unwrap().clone().unwrap();
    assert_eq!(notification.payload, "hello");
    assert_eq!(notification.pid, notifier.pid());
}

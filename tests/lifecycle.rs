mod common;

use common::require_conn;
use pgwire_client::{Error, ColumnValue};

#[tokio::test]
async fn close_rejects_queries_submitted_after() {
    let conn = require_conn!();

    conn.close().await.unwrap();
    assert!(conn.is_closed());

    let err = conn.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
}

#[tokio::test]
async fn close_is_idempotent() {
    let conn = require_conn!();

    conn.close().await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn server_terminated_backend_resolves_done_with_a_pg_error() {
    let conn = require_conn!();
    let Some(admin) = common::connect().await else {
        return;
    };

    let pid = conn.pid();
    admin
        .query(&format!("SELECT pg_terminate_backend({pid})"), &[])
        .await
        .unwrap();

    let reason = conn.closed().await;
    match reason {
        pgwire_client::DoneReason::Errored(message) => {
            assert!(
                message.contains("terminating connection due to administrator command"),
                "{message}"
            );
        }
        pgwire_client::DoneReason::Closed => panic!("expected Errored, got Closed"),
    }
}

#[tokio::test]
async fn client_side_error_does_not_abort_the_connection() {
    let conn = require_conn!();
    let err = conn
        .query("SELECT $1::int", &[ColumnValue::Text("nope".into())])
        .await
        .unwrap_err();
    assert!(!conn.is_closed(), "client-side errors must not close the connection: {err}");
}

/// A query already blocked on a read, and one already queued behind it
/// waiting for the lock token, must both reject rather than hang forever
/// once close() tears down the connection out from under them.
#[tokio::test]
async fn close_rejects_in_flight_and_queued_queries_instead_of_hanging() {
    let conn = require_conn!();

    let in_flight_conn = conn.clone();
    let in_flight = tokio::spawn(async move { in_flight_conn.query("SELECT pg_sleep(1)", &[]).await });

    // give the sleeping query time to take the lock before the next one queues behind it
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let queued_conn = conn.clone();
    let queued = tokio::spawn(async move { queued_conn.query("SELECT 1", &[]).await });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    conn.close().await.unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(5), in_flight)
        .await
        .expect("query already in flight hung after close()")
        .unwrap()
        .ok();

    let queued_result = tokio::time::timeout(std::time::Duration::from_secs(5), queued)
        .await
        .expect("query queued behind the lock hung after close()")
        .unwrap();
    if let Err(e) = queued_result {
        assert!(
            matches!(e, Error::ConnectionClosed | Error::Io(_)),
            "unexpected error: {e}"
        );
    }
}

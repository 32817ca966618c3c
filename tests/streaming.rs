mod common;

use common::require_conn;
use pgwire_client::ColumnValue;

#[tokio::test]
async fn streams_rows_one_at_a_time() {
    let conn = require_conn!();

    let mut result = conn
        .query_streaming("SELECT generate_series(1, 100)", &[])
        .await
        .unwrap();

    let mut sum = 0i64;
    let mut count = 0;
    while let Some(row) = result.next_row().await.unwrap() {
        sum += row.get(0).unwrap().as_i64().unwrap();
        count += 1;
    }

    assert_eq!(count, 100);
    assert_eq!(sum, 5050);
}

#[tokio::test]
async fn dropping_a_partial_stream_leaves_the_connection_usable() {
    let conn = require_conn!();

    {
        let mut result = conn
            .query_streaming("SELECT generate_series(1, 100)", &[])
            .await
            .unwrap();
        for _ in 0..10 {
            result.next_row().await.unwrap();
        }
        // dropped here, before CommandComplete
    }

    // give the background drain task a moment to run
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let row = conn.query("SELECT 42", &[]).await.unwrap().one_value().unwrap();
    assert_eq!(row, ColumnValue::I32(42));
}

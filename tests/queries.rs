mod common;

use common::require_conn;
use pgwire_client::ColumnValue;

#[tokio::test]
async fn sequential_queries_return_in_order() {
    let conn = require_conn!();

    for expected in [1i32, 2, 3] {
        let row = conn
            .query(&format!("SELECT {expected}"), &[])
            .await
            .unwrap()
            .one_value()
            .unwrap();
        assert_eq!(row, ColumnValue::I32(expected));
    }
}

#[tokio::test]
async fn concurrent_queries_serialise_and_preserve_order() {
    let conn = require_conn!();

    let (a, b, c) = tokio::join!(
        conn.query("SELECT 1", &[]),
        conn.query("SELECT 2", &[]),
        conn.query("SELECT 3", &[]),
    );

    assert_eq!(a.unwrap().one_value().unwrap(), ColumnValue::I32(1));
    assert_eq!(b.unwrap().one_value().unwrap(), ColumnValue::I32(2));
    assert_eq!(c.unwrap().one_value().unwrap(), ColumnValue::I32(3));
}

#[tokio::test]
async fn syntax_error_recovers_on_same_connection() {
    let conn = require_conn!();

    let err = conn.query("SELEKT 42", &[]).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("syntax error"), "{message}");
    assert!(message.contains("SELEKT"), "{message}");

    let row = conn.query("SELECT 42", &[]).await.unwrap().one_value().unwrap();
    assert_eq!(row, ColumnValue::I32(42));
}

#[tokio::test]
async fn bad_parameter_encoding_recovers_on_same_connection() {
    let conn = require_conn!();

    let err = conn
        .query("SELECT $1::int", &[ColumnValue::Text("not a number".into())])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Error sending param $1"), "{err}");

    let row = conn.query("SELECT 42", &[]).await.unwrap().one_value().unwrap();
    assert_eq!(row, ColumnValue::I32(42));
}

#[tokio::test]
async fn completion_info_reports_row_count() {
    let conn = require_conn!();

    let buffered = conn.query("SELECT 42", &[]).await.unwrap();
    assert_eq!(buffered.completion_info().rows_affected, Some(1));

    let mut streaming = conn.query_streaming("SELECT 42", &[]).await.unwrap();
    while streaming.next_row().await.unwrap().is_some() {}
    assert_eq!(streaming.completion_info().unwrap().rows_affected, Some(1));
}

#[tokio::test]
async fn prepared_statement_is_reused_across_executions() {
    let conn = require_conn!();

    let stmt = conn.prepare("SELECT $1::int + 100").await.unwrap();
    for (input, expected) in [(1i32, 101i32), (2, 102), (3, 103)] {
        let row = stmt
            .execute(&[ColumnValue::I32(input)])
            .await
            .unwrap()
            .one_value()
            .unwrap();
        assert_eq!(row, ColumnValue::I32(expected));
    }
    stmt.close().await.unwrap();
}

#[tokio::test]
async fn bpchar_pads_and_truncates() {
    let conn = require_conn!();

    let short = conn
        .query("SELECT 'shrt'::char(5)", &[])
        .await
        .unwrap()
        .one_value()
        .unwrap();
    assert_eq!(short, ColumnValue::Text("shrt ".into()));

    let long = conn
        .query("SELECT 'too long'::char(5)", &[])
        .await
        .unwrap()
        .one_value()
        .unwrap();
    assert_eq!(long, ColumnValue::Text("too l".into()));
}

#[tokio::test]
async fn no_prepared_statements_leak() {
    let conn = require_conn!();

    conn.query("SELECT 1", &[]).await.unwrap();
    let stmt = conn.prepare("SELECT 2").await.unwrap();
    stmt.execute(&[]).await.unwrap();
    stmt.close().await.unwrap();

    let leaked = conn
        .query("SELECT count(*) FROM pg_prepared_statements", &[])
        .await
        .unwrap()
        .one_value()
        .unwrap();
    assert_eq!(leaked, ColumnValue::I64(0));
}

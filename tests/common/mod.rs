//! Shared helper for integration tests: every test needs a live server,
//! reached through `ZP_TEST_DSN`. Tests skip (rather than fail) when it's
//! unset, so `cargo test` is still meaningful on a machine with no Postgres.

use pgwire_client::{Connection, ConnectionOptions};

pub async fn connect() -> Option<Connection> {
    let dsn = std::env::var("ZP_TEST_DSN").ok()?;
    let opts = ConnectionOptions::try_from(dsn.as_str()).expect("ZP_TEST_DSN must be a valid DSN");
    Some(
        Connection::connect(opts)
            .await
            .expect("failed to connect to ZP_TEST_DSN"),
    )
}

macro_rules! require_conn {
    () => {
        match crate::common::connect().await {
            Some(c) => c,
            None => {
                eprintln!("skipping: ZP_TEST_DSN not set");
                return;
            }
        }
    };
}

pub(crate) use require_conn;

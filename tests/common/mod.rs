#![allow(dead_code)]

use serde_json::Value as JsonValue;
use sqlite_bridge::prelude::*;
use tempfile::tempdir;
use tokio::sync::oneshot;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

/// Options for tests that want positional rows and no WAL files.
pub fn array_options() -> BridgeOptions {
    BridgeOptions::builder()
        .row_shape(RowShape::Array)
        .journal_mode_wal(false)
        .finish()
}

/// Submit one bridge call and wait for its callback.
pub async fn call(submit: impl FnOnce(Callback)) -> (Option<ErrorDescriptor>, Option<JsonValue>) {
    let (tx, rx) = oneshot::channel();
    submit(Box::new(move |error, payload| {
        let _ = tx.send((error, payload));
    }));
    rx.await.expect("callback fired")
}

pub fn expect_ok(
    (error, payload): (Option<ErrorDescriptor>, Option<JsonValue>),
) -> Option<JsonValue> {
    assert!(error.is_none(), "unexpected bridge error: {error:?}");
    payload
}

pub fn expect_err(
    (error, payload): (Option<ErrorDescriptor>, Option<JsonValue>),
) -> ErrorDescriptor {
    assert!(payload.is_none(), "unexpected payload alongside error: {payload:?}");
    error.expect("bridge error")
}

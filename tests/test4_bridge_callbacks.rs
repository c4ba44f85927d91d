mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{array_options, call, expect_err, expect_ok, init_tracing};
use serde_json::json;
use sqlite_bridge::prelude::*;

#[tokio::test]
async fn callback_walkthrough() {
    init_tracing();
    let bridge = BridgeModule::spawn(array_options()).expect("bridge");

    let db = expect_ok(call(|cb| bridge.open(":memory:", cb)).await).expect("id");
    assert_eq!(db, json!("db1"));
    let db = db.as_str().expect("string id").to_owned();

    expect_ok(call(|cb| bridge.exec(&db, "CREATE TABLE t(x)", vec![], "", cb)).await);
    let inserted =
        expect_ok(call(|cb| bridge.exec(&db, "INSERT INTO t VALUES (?)", vec![json!(42)], "", cb)).await)
            .expect("outcome");
    assert_eq!(inserted, json!({"rows": 0, "changes": 1, "lastInsertId": 1}));

    let stmt = expect_ok(
        call(|cb| bridge.prepare_statement(&db, "SELECT x FROM t", vec![], cb)).await,
    )
    .expect("statement id");
    assert_eq!(stmt, json!("stmt1"));
    let stmt = stmt.as_str().expect("string id").to_owned();

    let row = expect_ok(call(|cb| bridge.step_statement(&db, &stmt, cb)).await);
    assert_eq!(row, Some(json!([42])));
    let done = expect_ok(call(|cb| bridge.step_statement(&db, &stmt, cb)).await);
    assert_eq!(done, Some(serde_json::Value::Null));
    let done = expect_ok(call(|cb| bridge.step_statement(&db, &stmt, cb)).await);
    assert_eq!(done, Some(serde_json::Value::Null));

    assert_eq!(
        expect_ok(call(|cb| bridge.finalize_statement(&db, &stmt, cb)).await),
        None
    );
    let err = expect_err(call(|cb| bridge.finalize_statement(&db, &stmt, cb)).await);
    assert_eq!(err.kind, ErrorKind::NotFound);

    assert_eq!(expect_ok(call(|cb| bridge.close(&db, cb)).await), None);
    let err = expect_err(call(|cb| bridge.close(&db, cb)).await);
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn object_rows_are_keyed_by_column() {
    let options = BridgeOptions::builder().journal_mode_wal(false).finish();
    let bridge = BridgeModule::spawn(options).expect("bridge");
    let db = expect_ok(call(|cb| bridge.open(":memory:", cb)).await).expect("id");
    let db = db.as_str().expect("string id").to_owned();
    let stmt = expect_ok(
        call(|cb| bridge.prepare_statement(&db, "SELECT ? AS a, ? AS b", vec![json!(1), json!("two")], cb))
            .await,
    )
    .expect("statement id");
    let stmt = stmt.as_str().expect("string id").to_owned();
    let row = expect_ok(call(|cb| bridge.step_statement(&db, &stmt, cb)).await);
    assert_eq!(row, Some(json!({"a": 1, "b": "two"})));
}

#[tokio::test]
async fn invoke_decodes_method_names() {
    let bridge = BridgeModule::spawn(array_options()).expect("bridge");
    let db = expect_ok(call(|cb| bridge.invoke("openFromFilename", vec![json!(":memory:")], cb)).await)
        .expect("id");

    expect_ok(
        call(|cb| {
            bridge.invoke(
                "execOnDatabase",
                vec![db.clone(), json!("CREATE TABLE t(x)"), json!([]), json!(null)],
                cb,
            );
        })
        .await,
    );

    let err = expect_err(call(|cb| bridge.invoke("exec", vec![db.clone()], cb)).await);
    assert_eq!(err.kind, ErrorKind::InvalidArgument);

    let err = expect_err(
        call(|cb| {
            bridge.invoke(
                "exec",
                vec![db.clone(), json!("INSERT INTO t VALUES (?)"), json!([{"x": 1}]), json!("")],
                cb,
            );
        })
        .await,
    );
    assert_eq!(err.kind, ErrorKind::InvalidArgument);

    let err = expect_err(call(|cb| bridge.invoke("vacuum", vec![], cb)).await);
    assert_eq!(err.kind, ErrorKind::InvalidArgument);

    expect_ok(call(|cb| bridge.invoke("closeDatabase", vec![db.clone()], cb)).await);
}

#[tokio::test]
async fn row_events_precede_the_exec_callback() {
    let (sink, mut events) = ChannelEventSink::new();
    let bridge = BridgeModule::spawn_with_events(array_options(), Arc::new(sink)).expect("bridge");
    let db = expect_ok(call(|cb| bridge.open(":memory:", cb)).await).expect("id");
    let db = db.as_str().expect("string id").to_owned();
    expect_ok(call(|cb| bridge.exec(&db, "CREATE TABLE t(x)", vec![], "", cb)).await);
    expect_ok(
        call(|cb| bridge.exec(&db, "INSERT INTO t VALUES (1), (2)", vec![], "", cb)).await,
    );

    let outcome = expect_ok(
        call(|cb| bridge.exec(&db, "SELECT x FROM t ORDER BY x", vec![], "rows", cb)).await,
    )
    .expect("outcome");
    assert_eq!(outcome["rows"], json!(2));

    // both rows were queued before the callback fired
    let first = events.try_recv().expect("first row");
    let second = events.try_recv().expect("second row");
    assert_eq!((first.name.as_str(), first.row), ("rows", json!([1])));
    assert_eq!(second.row, json!([2]));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn every_call_answers_exactly_once_in_order() {
    let bridge = BridgeModule::spawn(array_options()).expect("bridge");
    let fired = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    for i in 0..20 {
        let fired = Arc::clone(&fired);
        let order = Arc::clone(&order);
        // a mix of successes and failures
        let filename = if i % 4 == 0 { "/no/such/dir/x.db".to_owned() } else { ":memory:".to_owned() };
        bridge.open(filename, move |error, payload| {
            assert!(error.is_some() != payload.is_some());
            fired.fetch_add(1, Ordering::SeqCst);
            order.lock().expect("order lock").push(i);
        });
    }
    // the queue is FIFO, so this runs after all of the above
    let err = expect_err(call(|cb| bridge.close("db999", cb)).await);
    assert_eq!(err.kind, ErrorKind::NotFound);

    assert_eq!(fired.load(Ordering::SeqCst), 20);
    assert_eq!(*order.lock().expect("order lock"), (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn panicking_callback_does_not_stop_dispatch() {
    let bridge = BridgeModule::spawn(array_options()).expect("bridge");
    bridge.open(":memory:", |_, _| panic!("callback failure"));
    let db = expect_ok(call(|cb| bridge.open(":memory:", cb)).await).expect("id");
    assert_eq!(db, json!("db2"));
}

#[test]
fn spawn_outside_runtime_is_unavailable() {
    let err = BridgeModule::spawn(BridgeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

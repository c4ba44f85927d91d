mod common;

use common::{init_tracing, unique_db_path};
use serde_json::json;
use sqlite_bridge::prelude::*;

#[tokio::test]
async fn execute_sql_streams_rows() -> Result<(), BridgeError> {
    init_tracing();
    let bridge = BridgeOptions::builder().build()?;
    let db = Database::open(&bridge, &unique_db_path("client")).await?;
    assert_eq!(db.id(), "db1");

    db.exec(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
        vec![],
    )
    .await?;
    for (name, age) in [("alice", json!(30)), ("bob", json!(null))] {
        let outcome = db
            .exec("INSERT INTO users (name, age) VALUES (?, ?)", vec![json!(name), age])
            .await?;
        assert_eq!(outcome.changes, 1);
    }

    let mut rows = Vec::new();
    let count = db
        .execute_sql(
            "SELECT name, age FROM users WHERE id >= ? ORDER BY id",
            vec![json!(1)],
            |row| rows.push(row),
        )
        .await?;
    assert_eq!(count, 2);
    assert_eq!(
        rows,
        vec![
            json!({"name": "alice", "age": 30}),
            json!({"name": "bob", "age": null}),
        ]
    );

    db.close().await
}

#[tokio::test]
async fn execute_sql_finalizes_its_statement() -> Result<(), BridgeError> {
    let bridge = BridgeOptions::builder().journal_mode_wal(false).build()?;
    let db = Database::open(&bridge, ":memory:").await?;
    db.execute_sql("SELECT 1", vec![], |_| {}).await?;
    // close refuses while statements are open, so this proves cleanup
    db.close().await
}

#[tokio::test]
async fn client_errors_keep_their_kind() -> Result<(), BridgeError> {
    let bridge = BridgeOptions::builder().journal_mode_wal(false).build()?;
    let db = Database::open(&bridge, ":memory:").await?;

    let err = db.execute_sql("SELECT * FROM nowhere", vec![], |_| {}).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineError);
    assert!(err.to_string().contains("no such table"), "{err}");

    let err = db
        .execute_sql("SELECT ?", vec![json!([1])], |_| {})
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = Database::open(&bridge, "/no/such/dir/x.db").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineError);

    db.close().await
}

//! Callback-style SQLite bridge.
//!
//! Lets an application runtime open SQLite databases, run SQL with bound
//! positional parameters, and step through prepared statements. Databases
//! and statements are referred to by generated string ids; every call is
//! answered through a callback that receives `(error, payload)` exactly
//! once.
//!
//! ```no_run
//! use sqlite_bridge::prelude::*;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), BridgeError> {
//! let bridge = BridgeOptions::builder().row_shape(RowShape::Array).build()?;
//! let db = Database::open(&bridge, ":memory:").await?;
//! db.exec("CREATE TABLE t(x)", vec![]).await?;
//! db.exec("INSERT INTO t VALUES (?)", vec![json!(42)]).await?;
//! db.execute_sql("SELECT x FROM t", vec![], |row| println!("{row}")).await?;
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod handles;
pub mod params;
pub mod prelude;
pub mod query;
pub mod types;

mod worker;

pub use adapter::SqliteAdapter;
pub use bridge::{BridgeModule, BridgeRequest, Callback};
pub use client::Database;
pub use config::{BridgeOptions, BridgeOptionsBuilder, CloseBehavior, RowShape};
pub use error::{BridgeError, ErrorDescriptor, ErrorKind, HandleKind};
pub use events::{ChannelEventSink, EventSink, NoopEventSink, RowEvent};
pub use types::{ExecOutcome, Row, SqlValue, StepOutcome};

//! Convenient imports for common functionality.

pub use crate::adapter::SqliteAdapter;
pub use crate::bridge::{BridgeModule, BridgeRequest, Callback};
pub use crate::client::Database;
pub use crate::config::{BridgeOptions, BridgeOptionsBuilder, CloseBehavior, RowShape};
pub use crate::error::{BridgeError, ErrorDescriptor, ErrorKind};
pub use crate::events::{ChannelEventSink, EventSink, NoopEventSink, RowEvent};
pub use crate::types::{ExecOutcome, Row, SqlValue, StepOutcome};

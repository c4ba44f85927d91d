//! Callback surface exposed to the calling runtime.
//!
//! Every method enqueues a bridge call and returns immediately. A single
//! dispatcher task drains the queue in order, runs each call to completion
//! against the [`SqliteAdapter`], then fires the call's callback exactly
//! once with either an error descriptor or a payload.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::adapter::SqliteAdapter;
use crate::config::BridgeOptions;
use crate::error::{BridgeError, ErrorDescriptor};
use crate::events::{EventSink, NoopEventSink};

/// `(error, payload)`; exactly one of the two is set on each invocation,
/// except for calls with no result (`close`, `finalizeStatement`) where both
/// are `None` on success.
pub type Callback = Box<dyn FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static>;

/// A decoded bridge call, minus its callback.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeRequest {
    Open {
        filename: String,
    },
    Close {
        database_id: String,
    },
    Exec {
        database_id: String,
        sql: String,
        params: Vec<JsonValue>,
        row_event: Option<String>,
    },
    PrepareStatement {
        database_id: String,
        sql: String,
        params: Vec<JsonValue>,
    },
    StepStatement {
        database_id: String,
        statement_id: String,
    },
    FinalizeStatement {
        database_id: String,
        statement_id: String,
    },
}

impl BridgeRequest {
    /// Decode a method name and positional JSON arguments.
    ///
    /// The legacy names `openFromFilename`, `closeDatabase` and
    /// `execOnDatabase` are accepted as aliases.
    ///
    /// # Errors
    /// `InvalidArgument` for an unknown method, wrong arity, or an argument
    /// of the wrong type.
    pub fn parse(method: &str, args: Vec<JsonValue>) -> Result<Self, BridgeError> {
        let mut args = Args::new(method, args);
        let request = match method {
            "open" | "openFromFilename" => BridgeRequest::Open {
                filename: args.string("filename")?,
            },
            "close" | "closeDatabase" => BridgeRequest::Close {
                database_id: args.string("databaseId")?,
            },
            "exec" | "execOnDatabase" => BridgeRequest::Exec {
                database_id: args.string("databaseId")?,
                sql: args.string("sql")?,
                params: args.array("params")?,
                row_event: args.optional_string("rowEvent")?,
            },
            "prepareStatement" => BridgeRequest::PrepareStatement {
                database_id: args.string("databaseId")?,
                sql: args.string("sql")?,
                params: args.array("params")?,
            },
            "stepStatement" => BridgeRequest::StepStatement {
                database_id: args.string("databaseId")?,
                statement_id: args.string("statementId")?,
            },
            "finalizeStatement" => BridgeRequest::FinalizeStatement {
                database_id: args.string("databaseId")?,
                statement_id: args.string("statementId")?,
            },
            other => {
                return Err(BridgeError::InvalidArgument(format!(
                    "unknown bridge method {other}"
                )));
            }
        };
        args.finish()?;
        Ok(request)
    }

    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            BridgeRequest::Open { .. } => "open",
            BridgeRequest::Close { .. } => "close",
            BridgeRequest::Exec { .. } => "exec",
            BridgeRequest::PrepareStatement { .. } => "prepareStatement",
            BridgeRequest::StepStatement { .. } => "stepStatement",
            BridgeRequest::FinalizeStatement { .. } => "finalizeStatement",
        }
    }

    async fn run(self, adapter: &mut SqliteAdapter) -> Result<Option<JsonValue>, BridgeError> {
        match self {
            BridgeRequest::Open { filename } => {
                let database_id = adapter.open(&filename).await?;
                Ok(Some(JsonValue::String(database_id)))
            }
            BridgeRequest::Close { database_id } => {
                adapter.close(&database_id).await?;
                Ok(None)
            }
            BridgeRequest::Exec {
                database_id,
                sql,
                params,
                row_event,
            } => {
                let outcome = adapter
                    .exec_json(&database_id, &sql, &params, row_event.as_deref())
                    .await?;
                Ok(Some(outcome.to_json()))
            }
            BridgeRequest::PrepareStatement {
                database_id,
                sql,
                params,
            } => {
                let statement_id = adapter
                    .prepare_statement_json(&database_id, &sql, &params)
                    .await?;
                Ok(Some(JsonValue::String(statement_id)))
            }
            BridgeRequest::StepStatement {
                database_id,
                statement_id,
            } => {
                let shape = adapter.options().row_shape;
                let outcome = adapter.step_statement(&database_id, &statement_id).await?;
                Ok(Some(outcome.to_json(shape)))
            }
            BridgeRequest::FinalizeStatement {
                database_id,
                statement_id,
            } => {
                adapter
                    .finalize_statement(&database_id, &statement_id)
                    .await?;
                Ok(None)
            }
        }
    }
}

/// Positional argument reader for [`BridgeRequest::parse`].
struct Args<'m> {
    method: &'m str,
    values: VecDeque<JsonValue>,
}

impl<'m> Args<'m> {
    fn new(method: &'m str, values: Vec<JsonValue>) -> Self {
        Self {
            method,
            values: values.into(),
        }
    }

    fn next(&mut self, name: &str) -> Result<JsonValue, BridgeError> {
        self.values.pop_front().ok_or_else(|| {
            BridgeError::InvalidArgument(format!("{}: missing argument {name}", self.method))
        })
    }

    fn string(&mut self, name: &str) -> Result<String, BridgeError> {
        match self.next(name)? {
            JsonValue::String(s) => Ok(s),
            other => Err(self.wrong_type(name, "a string", &other)),
        }
    }

    fn optional_string(&mut self, name: &str) -> Result<Option<String>, BridgeError> {
        match self.values.pop_front() {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) if s.is_empty() => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.wrong_type(name, "a string or null", &other)),
        }
    }

    fn array(&mut self, name: &str) -> Result<Vec<JsonValue>, BridgeError> {
        match self.next(name)? {
            JsonValue::Array(values) => Ok(values),
            JsonValue::Null => Ok(Vec::new()),
            other => Err(self.wrong_type(name, "an array", &other)),
        }
    }

    fn finish(self) -> Result<(), BridgeError> {
        if self.values.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::InvalidArgument(format!(
                "{}: {} unexpected extra argument(s)",
                self.method,
                self.values.len()
            )))
        }
    }

    fn wrong_type(&self, name: &str, expected: &str, got: &JsonValue) -> BridgeError {
        BridgeError::InvalidArgument(format!(
            "{}: {name} must be {expected}, got {got}",
            self.method
        ))
    }
}

struct BridgeCall {
    request: BridgeRequest,
    callback: Callback,
}

/// Cloneable handle to the bridge dispatcher.
///
/// The dispatcher and every open database live until the last clone is
/// dropped.
#[derive(Clone, Debug)]
pub struct BridgeModule {
    sender: mpsc::UnboundedSender<BridgeCall>,
}

impl std::fmt::Debug for BridgeCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeCall")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl BridgeModule {
    /// Spawn a dispatcher on the current tokio runtime.
    ///
    /// # Errors
    /// `Unavailable` when called outside a tokio runtime.
    pub fn spawn(options: BridgeOptions) -> Result<Self, BridgeError> {
        Self::spawn_with_events(options, Arc::new(NoopEventSink))
    }

    /// Like [`Self::spawn`], delivering `exec` row events to `events`.
    ///
    /// # Errors
    /// `Unavailable` when called outside a tokio runtime.
    pub fn spawn_with_events(
        options: BridgeOptions,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, BridgeError> {
        Self::from_adapter(SqliteAdapter::with_event_sink(options, events))
    }

    /// # Errors
    /// `Unavailable` when called outside a tokio runtime.
    pub fn from_adapter(adapter: SqliteAdapter) -> Result<Self, BridgeError> {
        let handle = Handle::try_current().map_err(|err| {
            BridgeError::Unavailable(format!("bridge module needs a tokio runtime: {err}"))
        })?;
        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(run_dispatcher(adapter, receiver));
        Ok(Self { sender })
    }

    /// Queue a decoded request.
    pub fn submit(
        &self,
        request: BridgeRequest,
        callback: impl FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static,
    ) {
        let call = BridgeCall {
            request,
            callback: Box::new(callback),
        };
        if let Err(mpsc::error::SendError(call)) = self.sender.send(call) {
            respond(
                call.request.method(),
                call.callback,
                Err(BridgeError::Unavailable("bridge dispatcher stopped".into())),
            );
        }
    }

    /// Dispatch by method name with positional JSON arguments.
    ///
    /// Decoding failures are reported through `callback` like any other
    /// error.
    pub fn invoke(
        &self,
        method: &str,
        args: Vec<JsonValue>,
        callback: impl FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static,
    ) {
        match BridgeRequest::parse(method, args) {
            Ok(request) => self.submit(request, callback),
            Err(err) => respond("invoke", Box::new(callback), Err(err)),
        }
    }

    pub fn open(
        &self,
        filename: impl Into<String>,
        callback: impl FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static,
    ) {
        self.submit(
            BridgeRequest::Open {
                filename: filename.into(),
            },
            callback,
        );
    }

    pub fn close(
        &self,
        database_id: impl Into<String>,
        callback: impl FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static,
    ) {
        self.submit(
            BridgeRequest::Close {
                database_id: database_id.into(),
            },
            callback,
        );
    }

    /// An empty `row_event` disables row notifications.
    pub fn exec(
        &self,
        database_id: impl Into<String>,
        sql: impl Into<String>,
        params: Vec<JsonValue>,
        row_event: impl Into<String>,
        callback: impl FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static,
    ) {
        let row_event = row_event.into();
        self.submit(
            BridgeRequest::Exec {
                database_id: database_id.into(),
                sql: sql.into(),
                params,
                row_event: (!row_event.is_empty()).then_some(row_event),
            },
            callback,
        );
    }

    pub fn prepare_statement(
        &self,
        database_id: impl Into<String>,
        sql: impl Into<String>,
        params: Vec<JsonValue>,
        callback: impl FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static,
    ) {
        self.submit(
            BridgeRequest::PrepareStatement {
                database_id: database_id.into(),
                sql: sql.into(),
                params,
            },
            callback,
        );
    }

    /// The payload is the row, or JSON `null` once the statement is done.
    pub fn step_statement(
        &self,
        database_id: impl Into<String>,
        statement_id: impl Into<String>,
        callback: impl FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static,
    ) {
        self.submit(
            BridgeRequest::StepStatement {
                database_id: database_id.into(),
                statement_id: statement_id.into(),
            },
            callback,
        );
    }

    pub fn finalize_statement(
        &self,
        database_id: impl Into<String>,
        statement_id: impl Into<String>,
        callback: impl FnOnce(Option<ErrorDescriptor>, Option<JsonValue>) + Send + 'static,
    ) {
        self.submit(
            BridgeRequest::FinalizeStatement {
                database_id: database_id.into(),
                statement_id: statement_id.into(),
            },
            callback,
        );
    }
}

async fn run_dispatcher(mut adapter: SqliteAdapter, mut receiver: mpsc::UnboundedReceiver<BridgeCall>) {
    while let Some(BridgeCall { request, callback }) = receiver.recv().await {
        let method = request.method();
        let outcome = request.run(&mut adapter).await;
        respond(method, callback, outcome);
    }
    tracing::debug!(
        open_databases = adapter.database_ids().len(),
        "bridge dispatcher stopped"
    );
}

fn respond(method: &'static str, callback: Callback, outcome: Result<Option<JsonValue>, BridgeError>) {
    let (error, payload) = match outcome {
        Ok(payload) => (None, payload),
        Err(err) => {
            tracing::debug!(method, error = %err, "bridge call failed");
            (Some(err.to_descriptor()), None)
        }
    };
    if catch_unwind(AssertUnwindSafe(move || callback(error, payload))).is_err() {
        tracing::error!(method, "bridge callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_exec_with_legacy_name() {
        let request = BridgeRequest::parse(
            "execOnDatabase",
            vec![json!("db1"), json!("SELECT ?"), json!([1]), json!("rows")],
        )
        .unwrap();
        assert_eq!(
            request,
            BridgeRequest::Exec {
                database_id: "db1".into(),
                sql: "SELECT ?".into(),
                params: vec![json!(1)],
                row_event: Some("rows".into()),
            }
        );
        assert_eq!(request.method(), "exec");
    }

    #[test]
    fn empty_row_event_means_none() {
        let request =
            BridgeRequest::parse("exec", vec![json!("db1"), json!("SELECT 1"), json!([]), json!("")])
                .unwrap();
        assert!(matches!(request, BridgeRequest::Exec { row_event: None, .. }));
    }

    #[test]
    fn rejects_bad_arity_and_types() {
        assert!(matches!(
            BridgeRequest::parse("open", vec![]),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            BridgeRequest::parse("open", vec![json!("a.db"), json!("extra")]),
            Err(BridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            BridgeRequest::parse("stepStatement", vec![json!("db1"), json!(3)]),
            Err(BridgeError::InvalidArgument(ref m)) if m.contains("statementId")
        ));
        assert!(matches!(
            BridgeRequest::parse("dropTable", vec![]),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn respond_survives_panicking_callback() {
        respond("open", Box::new(|_, _| panic!("boom")), Ok(None));
    }
}

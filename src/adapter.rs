use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::config::{BridgeOptions, CloseBehavior};
use crate::error::{BridgeError, HandleKind};
use crate::events::{EventSink, NoopEventSink, SharedEventSink};
use crate::handles::{HandleTable, IdGenerator};
use crate::params::Params;
use crate::types::{ExecOutcome, SqlValue, StepOutcome};
use crate::worker::{DatabaseWorker, RowEmitter};

struct DatabaseEntry {
    worker: DatabaseWorker,
    statements: HashSet<String>,
}

/// Typed core of the bridge: handle tables plus one worker per database.
///
/// Every method takes `&mut self`, so calls on one adapter are serialized by
/// construction. [`crate::bridge::BridgeModule`] wraps this in the callback
/// surface.
pub struct SqliteAdapter {
    options: BridgeOptions,
    databases: HandleTable<DatabaseEntry>,
    statement_ids: IdGenerator,
    events: SharedEventSink,
}

impl SqliteAdapter {
    #[must_use]
    pub fn new(options: BridgeOptions) -> Self {
        Self::with_event_sink(options, Arc::new(NoopEventSink))
    }

    #[must_use]
    pub fn with_event_sink(options: BridgeOptions, events: Arc<dyn EventSink>) -> Self {
        Self {
            databases: HandleTable::new(HandleKind::Database, options.database_id_prefix.clone()),
            statement_ids: IdGenerator::new(options.statement_id_prefix.clone()),
            options,
            events,
        }
    }

    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Open (or create) a database file and return its id.
    ///
    /// # Errors
    /// Returns the engine error if `SQLite` cannot open or configure the file.
    pub async fn open(&mut self, filename: &str) -> Result<String, BridgeError> {
        let path = self.options.resolve_path(filename);
        let database_id = self.databases.next_id();
        let worker = DatabaseWorker::spawn(database_id.clone(), path, &self.options).await?;
        let path = worker.path().display().to_string();
        let entry = DatabaseEntry {
            worker,
            statements: HashSet::new(),
        };
        self.databases.insert_with_id(database_id.clone(), entry);
        tracing::info!(
            database_id = %database_id,
            path = %path,
            open_databases = self.databases.len(),
            "database opened"
        );
        Ok(database_id)
    }

    /// Close a database and drop its handle.
    ///
    /// # Errors
    /// `NotFound` for an unknown id. With [`CloseBehavior::Refuse`], fails
    /// with `OpenStatements` and leaves the database open while statements
    /// remain.
    pub async fn close(&mut self, database_id: &str) -> Result<(), BridgeError> {
        let entry = self.databases.get(database_id)?;
        let finalize_statements = match self.options.close_behavior {
            CloseBehavior::Refuse => {
                if !entry.statements.is_empty() {
                    tracing::warn!(
                        database_id,
                        open_statements = entry.statements.len(),
                        "refusing to close database with open statements"
                    );
                    return Err(BridgeError::OpenStatements {
                        database_id: database_id.to_owned(),
                        count: entry.statements.len(),
                    });
                }
                false
            }
            CloseBehavior::FinalizeStatements => true,
        };

        let outcome = entry.worker.close(finalize_statements).await;
        if let Err(BridgeError::OpenStatements { .. }) = outcome {
            return outcome;
        }
        // any other outcome means the worker has exited
        let entry = self.databases.remove(database_id)?;
        tracing::info!(
            database_id = entry.worker.database_id(),
            finalized = entry.statements.len(),
            ok = outcome.is_ok(),
            "database closed"
        );
        outcome
    }

    /// Compile and fully run one statement.
    ///
    /// When `row_event` is set, each row is emitted to the event sink under
    /// that name before this returns.
    ///
    /// # Errors
    /// `NotFound`, `InvalidArgument` for a placeholder count mismatch, or the
    /// engine error verbatim.
    pub async fn exec(
        &mut self,
        database_id: &str,
        sql: &str,
        params: &[SqlValue],
        row_event: Option<&str>,
    ) -> Result<ExecOutcome, BridgeError> {
        self.exec_with(database_id, sql, Params::convert(params), row_event)
            .await
    }

    /// [`Self::exec`] with raw bridge arguments.
    ///
    /// # Errors
    /// As [`Self::exec`], plus `InvalidArgument` for non-scalar params.
    pub async fn exec_json(
        &mut self,
        database_id: &str,
        sql: &str,
        params: &[JsonValue],
        row_event: Option<&str>,
    ) -> Result<ExecOutcome, BridgeError> {
        let params = Params::from_json(params)?;
        self.exec_with(database_id, sql, params, row_event).await
    }

    async fn exec_with(
        &mut self,
        database_id: &str,
        sql: &str,
        params: Params,
        row_event: Option<&str>,
    ) -> Result<ExecOutcome, BridgeError> {
        let entry = self.databases.get(database_id)?;
        let emitter = row_event
            .filter(|event| !event.is_empty())
            .map(|event| RowEmitter {
                event: event.to_owned(),
                sink: Arc::clone(&self.events),
                shape: self.options.row_shape,
            });
        tracing::debug!(database_id, sql, params = params.len(), "exec");
        entry.worker.exec(sql.to_owned(), params, emitter).await
    }

    /// Compile a statement and bind its params without running it.
    ///
    /// # Errors
    /// `NotFound`, `InvalidArgument`, or the engine's compile error.
    pub async fn prepare_statement(
        &mut self,
        database_id: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<String, BridgeError> {
        self.prepare_with(database_id, sql, Params::convert(params))
            .await
    }

    /// [`Self::prepare_statement`] with raw bridge arguments.
    ///
    /// # Errors
    /// As [`Self::prepare_statement`], plus `InvalidArgument` for non-scalar
    /// params.
    pub async fn prepare_statement_json(
        &mut self,
        database_id: &str,
        sql: &str,
        params: &[JsonValue],
    ) -> Result<String, BridgeError> {
        let params = Params::from_json(params)?;
        self.prepare_with(database_id, sql, params).await
    }

    async fn prepare_with(
        &mut self,
        database_id: &str,
        sql: &str,
        params: Params,
    ) -> Result<String, BridgeError> {
        let entry = self.databases.get_mut(database_id)?;
        let statement_id = self.statement_ids.next_id();
        tracing::debug!(database_id, statement_id = %statement_id, sql, "prepare");
        entry
            .worker
            .prepare(statement_id.clone(), sql.to_owned(), params)
            .await?;
        entry.statements.insert(statement_id.clone());
        Ok(statement_id)
    }

    /// Advance a prepared statement by one row.
    ///
    /// # Errors
    /// `NotFound` if either id is unknown or the statement belongs to a
    /// different database.
    pub async fn step_statement(
        &mut self,
        database_id: &str,
        statement_id: &str,
    ) -> Result<StepOutcome, BridgeError> {
        let entry = self.statement_owner(database_id, statement_id)?;
        entry.worker.step(statement_id.to_owned()).await
    }

    /// Release a prepared statement.
    ///
    /// # Errors
    /// `NotFound` if either id is unknown, including a second finalize.
    pub async fn finalize_statement(
        &mut self,
        database_id: &str,
        statement_id: &str,
    ) -> Result<(), BridgeError> {
        self.statement_owner(database_id, statement_id)?;
        let entry = self.databases.get_mut(database_id)?;
        entry.statements.remove(statement_id);
        tracing::debug!(database_id, statement_id, "finalize");
        entry.worker.finalize(statement_id.to_owned()).await
    }

    fn statement_owner(
        &self,
        database_id: &str,
        statement_id: &str,
    ) -> Result<&DatabaseEntry, BridgeError> {
        let entry = self.databases.get(database_id)?;
        if entry.statements.contains(statement_id) {
            Ok(entry)
        } else {
            Err(BridgeError::statement_not_found(statement_id))
        }
    }

    /// Ids of every open database, sorted.
    #[must_use]
    pub fn database_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.databases.ids().map(str::to_owned).collect();
        ids.sort();
        ids
    }

    /// # Errors
    /// `NotFound` for an unknown database id.
    pub fn statement_count(&self, database_id: &str) -> Result<usize, BridgeError> {
        Ok(self.databases.get(database_id)?.statements.len())
    }

    /// # Errors
    /// `NotFound` for an unknown database id.
    pub fn database_path(&self, database_id: &str) -> Result<&Path, BridgeError> {
        Ok(self.databases.get(database_id)?.worker.path())
    }
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("options", &self.options)
            .field("databases", &self.database_ids())
            .finish()
    }
}

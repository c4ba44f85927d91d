use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use rusqlite::{Connection, Rows, Statement};
use self_cell::{MutBorrow, self_cell};

use crate::error::BridgeError;
use crate::params::{Params, bind_params};
use crate::query::{column_names, read_row};
use crate::types::{ExecOutcome, StepOutcome};

use super::channel::{Command, Responder, RowEmitter};

/// Own `conn` until the database is closed or the worker handle is dropped.
pub(super) fn run_database_worker(conn: Connection, receiver: &Receiver<Command>, database_id: &str) {
    let pending_close = serve(&conn, receiver, database_id);
    let outcome = conn.close().map_err(|(_, err)| BridgeError::Sqlite(err));
    match pending_close {
        Some(respond_to) => {
            let _ = respond_to.send(outcome);
        }
        None => {
            if let Err(err) = outcome {
                tracing::warn!(database_id, error = %err, "sqlite close failed during shutdown");
            }
        }
    }
}

self_cell!(
    /// A bound statement together with its live row cursor.
    struct LiveRows<'conn> {
        owner: MutBorrow<Statement<'conn>>,

        #[not_covariant]
        dependent: Rows,
    }
);

/// A compiled statement plus its cursor state.
///
/// Each step advances the underlying `SQLite` cursor by exactly one row.
/// Once the cursor reports the end, or fails, every later step is `Done`.
struct PreparedCursor<'conn> {
    rows: LiveRows<'conn>,
    columns: Arc<Vec<String>>,
    exhausted: bool,
}

impl<'conn> PreparedCursor<'conn> {
    fn new(stmt: Statement<'conn>) -> Self {
        let columns = column_names(&stmt);
        Self {
            rows: LiveRows::new(MutBorrow::new(stmt), |stmt| stmt.borrow_mut().raw_query()),
            columns,
            exhausted: false,
        }
    }

    fn step(&mut self) -> Result<StepOutcome, BridgeError> {
        if self.exhausted {
            return Ok(StepOutcome::Done);
        }
        let columns = &self.columns;
        let outcome = self
            .rows
            .with_dependent_mut(|_, rows| -> Result<StepOutcome, BridgeError> {
                match rows.next()? {
                    Some(row) => Ok(StepOutcome::Row(read_row(row, columns)?)),
                    None => Ok(StepOutcome::Done),
                }
            });
        if !matches!(outcome, Ok(StepOutcome::Row(_))) {
            self.exhausted = true;
        }
        outcome
    }

    fn finalize(self) -> Result<(), BridgeError> {
        self.rows.into_owner().into_inner().finalize()?;
        Ok(())
    }
}

fn serve<'conn>(
    conn: &'conn Connection,
    receiver: &Receiver<Command>,
    database_id: &str,
) -> Option<Responder<()>> {
    let mut statements: HashMap<String, PreparedCursor<'conn>> = HashMap::new();

    while let Ok(command) = receiver.recv() {
        match command {
            Command::Exec {
                sql,
                params,
                emitter,
                respond_to,
            } => {
                let _ = respond_to.send(exec(conn, &sql, &params, emitter.as_ref()));
            }
            Command::Prepare {
                statement_id,
                sql,
                params,
                respond_to,
            } => {
                let outcome = prepare(conn, &sql, &params).map(|cursor| {
                    statements.insert(statement_id, cursor);
                });
                let _ = respond_to.send(outcome);
            }
            Command::Step {
                statement_id,
                respond_to,
            } => {
                let outcome = match statements.get_mut(&statement_id) {
                    Some(cursor) => cursor.step(),
                    None => Err(BridgeError::statement_not_found(&statement_id)),
                };
                let _ = respond_to.send(outcome);
            }
            Command::Finalize {
                statement_id,
                respond_to,
            } => {
                let outcome = match statements.remove(&statement_id) {
                    Some(cursor) => cursor.finalize(),
                    None => Err(BridgeError::statement_not_found(&statement_id)),
                };
                let _ = respond_to.send(outcome);
            }
            Command::Close {
                finalize_statements,
                respond_to,
            } => {
                if !statements.is_empty() && !finalize_statements {
                    let _ = respond_to.send(Err(BridgeError::OpenStatements {
                        database_id: database_id.to_owned(),
                        count: statements.len(),
                    }));
                    continue;
                }
                finalize_all(&mut statements, database_id);
                return Some(respond_to);
            }
            Command::Shutdown => break,
        }
    }

    finalize_all(&mut statements, database_id);
    None
}

fn finalize_all(statements: &mut HashMap<String, PreparedCursor<'_>>, database_id: &str) {
    for (statement_id, cursor) in statements.drain() {
        if let Err(err) = cursor.finalize() {
            tracing::warn!(database_id, statement_id = %statement_id, error = %err, "finalize failed");
        }
    }
}

fn exec(
    conn: &Connection,
    sql: &str,
    params: &Params,
    emitter: Option<&RowEmitter>,
) -> Result<ExecOutcome, BridgeError> {
    let mut stmt = conn.prepare(sql)?;
    bind_params(&mut stmt, params)?;
    let columns = column_names(&stmt);
    let changes_before = total_changes(conn)?;

    let mut produced: u64 = 0;
    {
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            produced += 1;
            if let Some(emitter) = emitter {
                let row = read_row(row, &columns)?;
                emitter.sink.emit(&emitter.event, row.to_json(emitter.shape));
            }
        }
    }
    stmt.finalize()?;

    // DDL leaves sqlite3_changes() at the last DML count
    let changes = if total_changes(conn)? == changes_before {
        0
    } else {
        u64::try_from(conn.changes()).unwrap_or(u64::MAX)
    };
    Ok(ExecOutcome {
        rows: produced,
        changes,
        last_insert_id: conn.last_insert_rowid(),
    })
}

fn prepare<'conn>(
    conn: &'conn Connection,
    sql: &str,
    params: &Params,
) -> Result<PreparedCursor<'conn>, BridgeError> {
    let mut stmt = conn.prepare(sql)?;
    bind_params(&mut stmt, params)?;
    Ok(PreparedCursor::new(stmt))
}

fn total_changes(conn: &Connection) -> Result<i64, BridgeError> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

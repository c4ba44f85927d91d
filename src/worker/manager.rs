use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;

use rusqlite::Connection;
use tokio::sync::oneshot;

use crate::config::BridgeOptions;
use crate::error::BridgeError;
use crate::params::Params;
use crate::types::{ExecOutcome, StepOutcome};

use super::channel::{Command, Responder, RowEmitter};
use super::dispatcher::run_database_worker;

/// Handle to the thread that owns one open database.
pub(crate) struct DatabaseWorker {
    sender: Sender<Command>,
    database_id: String,
    path: PathBuf,
}

impl DatabaseWorker {
    /// Open the database on a fresh worker thread.
    ///
    /// The connection is opened and configured on the worker itself so it
    /// never crosses threads.
    pub(crate) async fn spawn(
        database_id: String,
        path: PathBuf,
        options: &BridgeOptions,
    ) -> Result<Self, BridgeError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let (opened_tx, opened_rx) = oneshot::channel::<Result<(), BridgeError>>();
        let thread_path = path.clone();
        let thread_id = database_id.clone();
        let options = options.clone();

        thread::Builder::new()
            .name(format!("sqlite-bridge-{database_id}"))
            .spawn(move || {
                let conn = match open_connection(&thread_path, &options) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = opened_tx.send(Err(err));
                        return;
                    }
                };
                if opened_tx.send(Ok(())).is_err() {
                    // nobody is waiting for this database anymore
                    let _ = conn.close();
                    return;
                }
                run_database_worker(conn, &receiver, &thread_id);
            })
            .map_err(|err| {
                BridgeError::Unavailable(format!("failed to spawn SQLite worker thread: {err}"))
            })?;

        opened_rx
            .await
            .map_err(|_| unavailable("SQLite worker exited while opening database"))??;

        Ok(Self {
            sender,
            database_id,
            path,
        })
    }

    pub(crate) fn database_id(&self) -> &str {
        &self.database_id
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn send_command(&self, command: Command) -> Result<(), BridgeError> {
        self.sender
            .send(command)
            .map_err(|_| unavailable("SQLite worker closed"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Responder<T>) -> Command,
        drop_message: &'static str,
    ) -> Result<T, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(build(tx))?;
        rx.await.map_err(|_| unavailable(drop_message))?
    }

    pub(crate) async fn exec(
        &self,
        sql: String,
        params: Params,
        emitter: Option<RowEmitter>,
    ) -> Result<ExecOutcome, BridgeError> {
        self.request(
            |respond_to| Command::Exec {
                sql,
                params,
                emitter,
                respond_to,
            },
            "SQLite worker dropped while executing statement",
        )
        .await
    }

    pub(crate) async fn prepare(
        &self,
        statement_id: String,
        sql: String,
        params: Params,
    ) -> Result<(), BridgeError> {
        self.request(
            |respond_to| Command::Prepare {
                statement_id,
                sql,
                params,
                respond_to,
            },
            "SQLite worker dropped while preparing statement",
        )
        .await
    }

    pub(crate) async fn step(&self, statement_id: String) -> Result<StepOutcome, BridgeError> {
        self.request(
            |respond_to| Command::Step {
                statement_id,
                respond_to,
            },
            "SQLite worker dropped while stepping statement",
        )
        .await
    }

    pub(crate) async fn finalize(&self, statement_id: String) -> Result<(), BridgeError> {
        self.request(
            |respond_to| Command::Finalize {
                statement_id,
                respond_to,
            },
            "SQLite worker dropped while finalizing statement",
        )
        .await
    }

    /// Close the connection. On success the worker thread has exited.
    pub(crate) async fn close(&self, finalize_statements: bool) -> Result<(), BridgeError> {
        self.request(
            |respond_to| Command::Close {
                finalize_statements,
                respond_to,
            },
            "SQLite worker dropped while closing database",
        )
        .await
    }
}

impl Drop for DatabaseWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

impl std::fmt::Debug for DatabaseWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseWorker")
            .field("database_id", &self.database_id)
            .field("path", &self.path)
            .finish()
    }
}

fn open_connection(path: &Path, options: &BridgeOptions) -> Result<Connection, BridgeError> {
    let conn = Connection::open(path)?;
    options.apply_pragmas(&conn)?;
    Ok(conn)
}

fn unavailable(message: &str) -> BridgeError {
    BridgeError::Unavailable(message.into())
}

//! Async client over the bridge callbacks.
//!
//! Mirrors how an application layer drives the bridge: open once, run each
//! query as prepare → step until done → finalize, close when finished.

use serde_json::Value as JsonValue;
use tokio::sync::oneshot;

use crate::bridge::{BridgeModule, Callback};
use crate::error::BridgeError;
use crate::types::ExecOutcome;

/// An open database reached through a [`BridgeModule`].
#[derive(Debug, Clone)]
pub struct Database {
    bridge: BridgeModule,
    database_id: String,
}

impl Database {
    /// # Errors
    /// Whatever the bridge reports for `open`.
    pub async fn open(bridge: &BridgeModule, filename: &str) -> Result<Self, BridgeError> {
        let payload = call(|callback| bridge.open(filename, callback)).await?;
        Ok(Self {
            bridge: bridge.clone(),
            database_id: expect_id(payload, "open")?,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.database_id
    }

    /// Run `sql`, handing each row to `on_row`. Returns the number of rows.
    ///
    /// The statement is finalized even when stepping fails; the step error
    /// wins over a finalize error.
    ///
    /// # Errors
    /// The first error reported by prepare, step or finalize.
    pub async fn execute_sql(
        &self,
        sql: &str,
        params: Vec<JsonValue>,
        mut on_row: impl FnMut(JsonValue),
    ) -> Result<u64, BridgeError> {
        let payload = call(|callback| {
            self.bridge
                .prepare_statement(&self.database_id, sql, params, callback);
        })
        .await?;
        let statement_id = expect_id(payload, "prepareStatement")?;

        let stepped = self.drain(&statement_id, &mut on_row).await;
        let finalized = call(|callback| {
            self.bridge
                .finalize_statement(&self.database_id, &statement_id, callback);
        })
        .await;

        let rows = stepped?;
        finalized?;
        Ok(rows)
    }

    async fn drain(
        &self,
        statement_id: &str,
        on_row: &mut impl FnMut(JsonValue),
    ) -> Result<u64, BridgeError> {
        let mut rows = 0;
        loop {
            let payload = call(|callback| {
                self.bridge
                    .step_statement(&self.database_id, statement_id, callback);
            })
            .await?;
            match payload {
                None | Some(JsonValue::Null) => return Ok(rows),
                Some(row) => {
                    rows += 1;
                    on_row(row);
                }
            }
        }
    }

    /// Run a statement to completion without looking at its rows.
    ///
    /// # Errors
    /// Whatever the bridge reports for `exec`.
    pub async fn exec(&self, sql: &str, params: Vec<JsonValue>) -> Result<ExecOutcome, BridgeError> {
        let payload = call(|callback| {
            self.bridge
                .exec(&self.database_id, sql, params, "", callback);
        })
        .await?
        .ok_or_else(|| BridgeError::Unavailable("exec returned no outcome".into()))?;
        serde_json::from_value(payload).map_err(|err| {
            BridgeError::Unavailable(format!("exec returned a malformed outcome: {err}"))
        })
    }

    /// # Errors
    /// Whatever the bridge reports for `close`; on failure the database
    /// stays open and this handle is gone, so keep a clone if you need to
    /// retry.
    pub async fn close(self) -> Result<(), BridgeError> {
        call(|callback| self.bridge.close(&self.database_id, callback)).await?;
        Ok(())
    }
}

/// Submit one bridge call and wait for its callback.
async fn call(submit: impl FnOnce(Callback)) -> Result<Option<JsonValue>, BridgeError> {
    let (tx, rx) = oneshot::channel();
    submit(Box::new(move |error, payload| {
        let _ = tx.send(match error {
            Some(descriptor) => Err(BridgeError::from(descriptor)),
            None => Ok(payload),
        });
    }));
    rx.await
        .map_err(|_| BridgeError::Unavailable("bridge callback dropped without firing".into()))?
}

fn expect_id(payload: Option<JsonValue>, method: &str) -> Result<String, BridgeError> {
    match payload {
        Some(JsonValue::String(id)) => Ok(id),
        other => Err(BridgeError::Unavailable(format!(
            "{method} returned {other:?} instead of an id"
        ))),
    }
}
